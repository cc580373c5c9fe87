use super::aggregator::Richlist;
use crate::wallet::BalanceComponents;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Error types for richlist queries
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Denom '{denom}' is not known")]
    UnknownDenom { denom: String },

    #[error("Limit {limit} is outside 1..=100")]
    InvalidLimit { limit: u32 },
}

/// One wallet as it appears in a richlist page, reduced to the requested asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichlistWallet {
    pub address: String,
    pub last_seen_time: Option<DateTime<Utc>>,
    pub last_seen_height: u64,
    pub last_checked_time: Option<DateTime<Utc>>,
    pub last_checked_height: u64,
    pub username: Option<String>,
    pub validator: Option<String>,
    pub balance: BalanceComponents,
}

/// A window of one asset's ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichlistPage {
    pub denom: String,
    /// Wallets holding the asset.
    pub total: usize,
    /// Wallets in this page.
    pub total_subset: usize,
    pub limit: u32,
    pub offset: usize,
    pub wallets: Vec<RichlistWallet>,
}

/// Read handle on the latest published richlist. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RichlistReader {
    receiver: watch::Receiver<Arc<Richlist>>,
}

impl RichlistReader {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Richlist>>) -> Self {
        Self { receiver }
    }

    /// The current richlist. Later rebuilds do not affect the returned value.
    pub fn snapshot(&self) -> Arc<Richlist> {
        self.receiver.borrow().clone()
    }

    /// Assets with a richlist, sorted.
    pub fn denoms(&self) -> Vec<String> {
        self.snapshot().denoms().map(str::to_string).collect()
    }

    /// Page through the ranking of `denom`.
    ///
    /// `limit` defaults to 10 and must lie within 1..=100; `offset` defaults to 0. An
    /// offset past the end yields an empty page.
    pub fn top(
        &self,
        denom: &str,
        limit: Option<u32>,
        offset: Option<usize>,
    ) -> Result<RichlistPage, QueryError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(QueryError::InvalidLimit { limit });
        }
        let offset = offset.unwrap_or(0);

        let snapshot = self.snapshot();
        let ranking = snapshot
            .ranking(denom)
            .ok_or_else(|| QueryError::UnknownDenom {
                denom: denom.to_string(),
            })?;

        let wallets: Vec<RichlistWallet> = ranking
            .iter()
            .skip(offset)
            .take(limit as usize)
            .filter_map(|wallet| {
                let balance = wallet.balances.get(denom)?.clone();
                Some(RichlistWallet {
                    address: wallet.address.clone(),
                    last_seen_time: wallet.last_seen_time,
                    last_seen_height: wallet.last_seen_height,
                    last_checked_time: wallet.last_checked_time,
                    last_checked_height: wallet.last_checked_height,
                    username: wallet.username.clone(),
                    validator: wallet.validator_operator_address.clone(),
                    balance,
                })
            })
            .collect();

        Ok(RichlistPage {
            denom: denom.to_string(),
            total: ranking.len(),
            total_subset: wallets.len(),
            limit,
            offset,
            wallets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::address;
    use crate::richlist::RichlistAggregator;
    use crate::wallet::{BalanceDelta, Wallet};
    use rust_decimal_macros::dec;

    fn reader_with(count: u8) -> RichlistReader {
        let wallets: Vec<Wallet> = (1..=count)
            .map(|seed| {
                let mut wallet = Wallet::placeholder(address(seed));
                for (denom, amount) in [("swth", dec!(1)), ("eth", dec!(2))] {
                    wallet
                        .apply_balance_delta(
                            denom,
                            8,
                            &BalanceDelta {
                                staking: Some(amount * rust_decimal::Decimal::from(seed)),
                                ..BalanceDelta::default()
                            },
                        )
                        .unwrap();
                }
                wallet
            })
            .collect();
        let (aggregator, reader) = RichlistAggregator::new();
        aggregator.rebuild(&wallets);
        reader
    }

    #[test]
    fn test_top_pages_through_ranking() {
        let reader = reader_with(25);

        let page = reader.top("swth", None, None).unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.total_subset, 10);
        assert_eq!(page.limit, 10);
        assert_eq!(page.wallets[0].address, address(25));

        let tail = reader.top("swth", Some(10), Some(20)).unwrap();
        assert_eq!(tail.total_subset, 5);
        assert_eq!(tail.offset, 20);
        assert_eq!(tail.wallets.last().unwrap().address, address(1));
        assert_eq!(tail.wallets[0].balance.total().to_string(), "5.00000000");

        let past_end = reader.top("swth", Some(5), Some(1000)).unwrap();
        assert!(past_end.wallets.is_empty());
    }

    #[test]
    fn test_page_only_carries_requested_asset() {
        let reader = reader_with(2);
        let page = reader.top("eth", Some(1), None).unwrap();

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["wallets"][0]["balance"]["staking"], "4.00000000");
        assert!(json["wallets"][0]["balance"].get("swth").is_none());
    }

    #[test]
    fn test_unknown_denom_is_not_found() {
        let reader = reader_with(2);
        assert_eq!(
            reader.top("moon", None, None),
            Err(QueryError::UnknownDenom {
                denom: "moon".to_string()
            })
        );
        assert_eq!(
            QueryError::UnknownDenom {
                denom: "moon".to_string()
            }
            .to_string(),
            "Denom 'moon' is not known"
        );
    }

    #[test]
    fn test_limit_bounds() {
        let reader = reader_with(2);
        assert_eq!(
            reader.top("swth", Some(0), None),
            Err(QueryError::InvalidLimit { limit: 0 })
        );
        assert_eq!(
            reader.top("swth", Some(101), None),
            Err(QueryError::InvalidLimit { limit: 101 })
        );
        assert!(reader.top("swth", Some(100), None).is_ok());
    }

    #[test]
    fn test_snapshot_is_stable_across_rebuilds() {
        let (aggregator, reader) = RichlistAggregator::new();
        let mut holder = Wallet::placeholder(address(1));
        holder
            .apply_balance_delta("swth", 8, &BalanceDelta::default())
            .unwrap();
        aggregator.rebuild(&[holder]);
        let before = reader.snapshot();

        aggregator.rebuild(&[Wallet::placeholder(address(1))]);

        assert_eq!(before.ranking("swth").map(<[_]>::len), Some(1));
        assert!(reader.denoms().is_empty());
    }
}
