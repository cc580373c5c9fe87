//! Refresh of a single wallet from the chain-data gateway.
//!
//! A refresh walks a fixed sequence of fetch steps, each merging its slice of the balance
//! into a working copy of the wallet. Only a refresh that reaches the end is handed back to
//! the caller, so the stored wallet never reflects half a refresh.
//!
//! Two kinds of failure restart the sequence from the top:
//! - a validator wallet whose validator or delegation no longer exists is demoted to a
//!   plain delegator and refreshed again straight away
//! - timeouts and a syncing node wait the matching backoff first

use crate::gateway::{ChainGateway, ChainHead, Coin};
use crate::utils::{RetryPolicy, Shutdown, parse_amount, raw_to_decimal};
use crate::wallet::{BalanceDelta, DecimalRegistry, Wallet, WalletSyncError};

use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetch steps of a refresh, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStep {
    ResetBalances,
    FetchLiveBalance,
    FetchDelegations,
    FetchProfile,
    FetchUnbonding,
    FetchDistribution,
}

impl RefreshStep {
    pub const ALL: [RefreshStep; 6] = [
        RefreshStep::ResetBalances,
        RefreshStep::FetchLiveBalance,
        RefreshStep::FetchDelegations,
        RefreshStep::FetchProfile,
        RefreshStep::FetchUnbonding,
        RefreshStep::FetchDistribution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStep::ResetBalances => "reset_balances",
            RefreshStep::FetchLiveBalance => "fetch_live_balance",
            RefreshStep::FetchDelegations => "fetch_delegations",
            RefreshStep::FetchProfile => "fetch_profile",
            RefreshStep::FetchUnbonding => "fetch_unbonding",
            RefreshStep::FetchDistribution => "fetch_distribution",
        }
    }
}

impl fmt::Display for RefreshStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refreshes wallets one at a time against the gateway.
pub struct WalletUpdater {
    gateway: Arc<dyn ChainGateway>,
    registry: DecimalRegistry,
    policy: RetryPolicy,
    staking_denom: String,
    shutdown: Shutdown,
}

impl WalletUpdater {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        policy: RetryPolicy,
        staking_denom: impl Into<String>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            gateway,
            registry: DecimalRegistry::new(),
            policy,
            staking_denom: staking_denom.into(),
            shutdown,
        }
    }

    /// Refresh `wallet` and return the updated copy, stamped as checked at `head`.
    ///
    /// The input wallet is never modified.
    pub async fn refresh(
        &mut self,
        wallet: &Wallet,
        head: &ChainHead,
    ) -> Result<Wallet, WalletSyncError> {
        let mut working = wallet.clone();
        let mut attempts: u32 = 1;

        loop {
            if self.shutdown.is_triggered() {
                return Err(WalletSyncError::Shutdown);
            }

            let (step, error) = match self.run_steps(&mut working).await {
                Ok(()) => break,
                Err(failure) => failure,
            };

            match error {
                WalletSyncError::Gateway(e) if e.is_stale_role() && working.is_validator() => {
                    warn!(
                        address = %working.address,
                        step = %step,
                        "Validator {} is gone ({}), refreshing as delegator",
                        working.validator_operator_address.as_deref().unwrap_or_default(),
                        e
                    );
                    working.demote();
                }
                WalletSyncError::Gateway(e) if e.is_transient() => {
                    if !self.policy.allows_another(attempts) {
                        return Err(WalletSyncError::RetriesExhausted {
                            address: working.address.clone(),
                            attempts,
                            last_error: e,
                        });
                    }
                    let delay = self.policy.delay_for(&e).unwrap_or_default();
                    warn!(
                        address = %working.address,
                        step = %step,
                        "{}, wait {}s and retry",
                        e,
                        delay.as_secs()
                    );
                    if !self.shutdown.sleep(delay).await {
                        return Err(WalletSyncError::Shutdown);
                    }
                    attempts += 1;
                }
                other => return Err(other),
            }
        }

        working.last_checked_height = head.height;
        working.last_checked_time = Some(head.time);
        info!(
            address = %working.address,
            height = head.height,
            "Wallet refreshed"
        );
        Ok(working)
    }

    /// One pass over every step. Reports the step that failed alongside the error.
    async fn run_steps(
        &mut self,
        wallet: &mut Wallet,
    ) -> Result<(), (RefreshStep, WalletSyncError)> {
        for step in RefreshStep::ALL {
            debug!(address = %wallet.address, step = %step, "Running refresh step");
            self.run_step(step, wallet)
                .await
                .map_err(|error| (step, error))?;
        }
        Ok(())
    }

    async fn run_step(
        &mut self,
        step: RefreshStep,
        wallet: &mut Wallet,
    ) -> Result<(), WalletSyncError> {
        match step {
            RefreshStep::ResetBalances => {
                wallet.balances.clear();
                Ok(())
            }
            RefreshStep::FetchLiveBalance => self.fetch_live_balance(wallet).await,
            RefreshStep::FetchDelegations => self.fetch_delegations(wallet).await,
            RefreshStep::FetchProfile => self.fetch_profile(wallet).await,
            RefreshStep::FetchUnbonding => self.fetch_unbonding(wallet).await,
            RefreshStep::FetchDistribution => self.fetch_distribution(wallet).await,
        }
    }

    async fn fetch_live_balance(&mut self, wallet: &mut Wallet) -> Result<(), WalletSyncError> {
        for live in self.gateway.balances(&wallet.address).await? {
            let decimals = self.decimals_of(&live.denom).await?;
            let delta = BalanceDelta {
                available: Some(human_amount(&live.denom, &live.available)?),
                orders: Some(human_amount(&live.denom, &live.order)?),
                positions: Some(human_amount(&live.denom, &live.position)?),
                ..BalanceDelta::default()
            };
            wallet.apply_balance_delta(&live.denom, decimals, &delta)?;
        }
        Ok(())
    }

    async fn fetch_delegations(&mut self, wallet: &mut Wallet) -> Result<(), WalletSyncError> {
        for coin in self.gateway.delegations(&wallet.address).await? {
            let (decimals, amount) = self.coin_amount(&coin).await?;
            let delta = BalanceDelta {
                staking: Some(amount),
                ..BalanceDelta::default()
            };
            wallet.apply_balance_delta(&coin.denom, decimals, &delta)?;
        }
        Ok(())
    }

    async fn fetch_profile(&mut self, wallet: &mut Wallet) -> Result<(), WalletSyncError> {
        let profile = self.gateway.profile(&wallet.address).await?;
        if let Some(username) = profile.username {
            wallet.username = Some(username);
        }
        wallet.last_seen_height = profile.last_seen_height;
        if profile.last_seen_time.is_some() {
            wallet.last_seen_time = profile.last_seen_time;
        }
        Ok(())
    }

    async fn fetch_unbonding(&mut self, wallet: &mut Wallet) -> Result<(), WalletSyncError> {
        let unbonding = self.gateway.unbonding_delegations(&wallet.address).await?;
        let denom = self.staking_denom.clone();
        let decimals = self.decimals_of(&denom).await?;

        // Every refreshed wallet carries a staking entry, even with nothing unbonding.
        let mut total = Decimal::ZERO;
        for entry in unbonding.iter().flat_map(|delegation| &delegation.entries) {
            let amount = raw_amount(&denom, &entry.balance, decimals)?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| WalletSyncError::AmountOverflow {
                    denom: denom.clone(),
                })?;
        }
        let delta = BalanceDelta {
            unbonding: Some(total),
            ..BalanceDelta::default()
        };
        wallet.apply_balance_delta(&denom, decimals, &delta)?;
        Ok(())
    }

    async fn fetch_distribution(&mut self, wallet: &mut Wallet) -> Result<(), WalletSyncError> {
        match wallet.validator_operator_address.clone() {
            Some(operator) => {
                let distribution = self.gateway.validator_distribution(&operator).await?;
                for coin in &distribution.self_bond_rewards {
                    let (decimals, amount) = self.coin_amount(coin).await?;
                    let delta = BalanceDelta {
                        rewards: Some(amount),
                        ..BalanceDelta::default()
                    };
                    wallet.apply_balance_delta(&coin.denom, decimals, &delta)?;
                }
                for coin in &distribution.commission {
                    let (decimals, amount) = self.coin_amount(coin).await?;
                    let delta = BalanceDelta {
                        commission: Some(amount),
                        ..BalanceDelta::default()
                    };
                    wallet.apply_balance_delta(&coin.denom, decimals, &delta)?;
                }
            }
            None => {
                for coin in self.gateway.delegator_rewards(&wallet.address).await? {
                    let (decimals, amount) = self.coin_amount(&coin).await?;
                    let delta = BalanceDelta {
                        rewards: Some(amount),
                        ..BalanceDelta::default()
                    };
                    wallet.apply_balance_delta(&coin.denom, decimals, &delta)?;
                }
            }
        }
        Ok(())
    }

    async fn decimals_of(&mut self, denom: &str) -> Result<u32, WalletSyncError> {
        self.registry.decimals_of(self.gateway.as_ref(), denom).await
    }

    /// Decimals of the coin's asset and its amount converted from raw units.
    async fn coin_amount(&mut self, coin: &Coin) -> Result<(u32, Decimal), WalletSyncError> {
        let decimals = self.decimals_of(&coin.denom).await?;
        Ok((decimals, raw_amount(&coin.denom, &coin.amount, decimals)?))
    }
}

fn human_amount(denom: &str, amount: &str) -> Result<Decimal, WalletSyncError> {
    parse_amount(amount).ok_or_else(|| invalid_amount(denom, amount))
}

fn raw_amount(denom: &str, amount: &str, decimals: u32) -> Result<Decimal, WalletSyncError> {
    raw_to_decimal(amount, decimals).ok_or_else(|| invalid_amount(denom, amount))
}

fn invalid_amount(denom: &str, amount: &str) -> WalletSyncError {
    WalletSyncError::InvalidAmount {
        denom: denom.to_string(),
        amount: amount.to_string(),
    }
}
