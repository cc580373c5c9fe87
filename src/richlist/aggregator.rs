use super::query::RichlistReader;
use crate::wallet::Wallet;

use itertools::Itertools;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Point-in-time ranking of wallets per asset.
///
/// Every ranking is ordered by descending numeric total. Wallets with equal totals keep
/// the order they were handed to [`Richlist::build`] in.
#[derive(Debug, Default)]
pub struct Richlist {
    rankings: BTreeMap<String, Vec<Arc<Wallet>>>,
}

impl Richlist {
    pub fn build<'a>(wallets: impl IntoIterator<Item = &'a Wallet>) -> Self {
        let grouped = wallets
            .into_iter()
            .map(|wallet| Arc::new(wallet.clone()))
            .flat_map(|wallet| {
                wallet
                    .balances
                    .keys()
                    .map(|denom| (denom.clone(), wallet.clone()))
                    .collect::<Vec<_>>()
            })
            .into_group_map();

        let rankings = grouped
            .into_iter()
            .map(|(denom, mut holders)| {
                // Stable, so ties stay in input order.
                holders.sort_by(|a, b| total_of(b, &denom).cmp(&total_of(a, &denom)));
                (denom, holders)
            })
            .collect();

        Self { rankings }
    }

    /// Assets that have a ranking, in lexical order.
    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.rankings.keys().map(String::as_str)
    }

    pub fn ranking(&self, denom: &str) -> Option<&[Arc<Wallet>]> {
        self.rankings.get(denom).map(Vec::as_slice)
    }
}

fn total_of(wallet: &Wallet, denom: &str) -> rust_decimal::Decimal {
    wallet
        .balances
        .get(denom)
        .map(|balance| balance.total())
        .unwrap_or_default()
}

/// Sole writer of the published [`Richlist`].
pub struct RichlistAggregator {
    sender: watch::Sender<Arc<Richlist>>,
}

impl RichlistAggregator {
    /// Create the aggregator with an empty richlist and a reader observing it.
    pub fn new() -> (Self, RichlistReader) {
        let (sender, receiver) = watch::channel(Arc::new(Richlist::default()));
        (Self { sender }, RichlistReader::new(receiver))
    }

    /// Rebuild every ranking from `wallets` and publish the result.
    pub fn rebuild<'a>(&self, wallets: impl IntoIterator<Item = &'a Wallet>) -> Arc<Richlist> {
        let richlist = Arc::new(Richlist::build(wallets));
        for denom in richlist.denoms() {
            info!(
                denom,
                "Updated richlist for coin '{}'. Wallets: {}",
                denom,
                richlist.ranking(denom).map_or(0, <[_]>::len)
            );
        }
        self.sender.send_replace(richlist.clone());
        richlist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::address;
    use crate::wallet::BalanceDelta;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn holding(seed: u8, holdings: &[(&str, Decimal)]) -> Wallet {
        let mut wallet = Wallet::placeholder(address(seed));
        for (denom, amount) in holdings {
            wallet
                .apply_balance_delta(
                    denom,
                    8,
                    &BalanceDelta {
                        available: Some(*amount),
                        ..BalanceDelta::default()
                    },
                )
                .unwrap();
        }
        wallet
    }

    fn ranked_addresses(richlist: &Richlist, denom: &str) -> Vec<String> {
        richlist
            .ranking(denom)
            .unwrap()
            .iter()
            .map(|wallet| wallet.address.clone())
            .collect()
    }

    #[test]
    fn test_ranks_by_numeric_total() {
        let wallets = vec![
            holding(1, &[("swth", dec!(5))]),
            holding(2, &[("swth", dec!(100))]),
            holding(3, &[("swth", dec!(5))]),
            holding(4, &[("swth", dec!(20))]),
        ];

        let richlist = Richlist::build(&wallets);

        // 100 before 20 before the tied pair, whose input order is kept.
        assert_eq!(
            ranked_addresses(&richlist, "swth"),
            vec![address(2), address(4), address(1), address(3)]
        );
    }

    #[test]
    fn test_groups_wallets_by_every_held_asset() {
        let wallets = vec![
            holding(1, &[("swth", dec!(1)), ("eth", dec!(3))]),
            holding(2, &[("eth", dec!(7))]),
        ];

        let richlist = Richlist::build(&wallets);

        assert_eq!(richlist.denoms().collect::<Vec<_>>(), vec!["eth", "swth"]);
        assert_eq!(ranked_addresses(&richlist, "eth"), vec![address(2), address(1)]);
        assert_eq!(ranked_addresses(&richlist, "swth"), vec![address(1)]);
        assert!(richlist.ranking("usdc1").is_none());
    }

    #[test]
    fn test_rebuild_publishes_to_readers() {
        let (aggregator, reader) = RichlistAggregator::new();
        assert!(reader.denoms().is_empty());

        aggregator.rebuild(&[holding(1, &[("swth", dec!(2))])]);

        assert_eq!(reader.denoms(), vec!["swth".to_string()]);
    }
}
