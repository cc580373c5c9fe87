use super::store::WalletStore;
use crate::gateway::ChainGateway;
use crate::wallet::WalletSyncError;

use std::sync::Arc;
use tracing::{info, warn};

/// Counts gathered by one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub validators: usize,
    pub delegators_seen: usize,
    pub pools: usize,
    pub wallets_created: usize,
}

/// Finds wallets through the staking and liquidity pool endpoints.
///
/// Discovery only adds wallets and labels them; balances are left to the updater.
pub struct DiscoveryScanner {
    gateway: Arc<dyn ChainGateway>,
}

impl DiscoveryScanner {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }

    /// Walk validators, their delegators and the liquidity pools, adding every wallet
    /// not yet in `store`.
    pub async fn rediscover_all(
        &self,
        store: &mut WalletStore,
    ) -> Result<DiscoveryReport, WalletSyncError> {
        let known_before = store.len();
        let mut report = DiscoveryReport::default();

        let validators = self.gateway.validators().await?;
        info!("Found {} validators in total", validators.len());

        for validator in validators {
            report.validators += 1;
            match store.ensure(&validator.wallet_address) {
                Ok(wallet) => {
                    wallet.validator_operator_address = Some(validator.operator_address.clone());
                    wallet.username = Some(validator.moniker.clone());
                }
                Err(e) => warn!("Skipping validator {}: {}", validator.moniker, e),
            }

            let delegators = match self
                .gateway
                .validator_delegators(&validator.operator_address)
                .await
            {
                Ok(delegators) => delegators,
                Err(e) if !e.is_transient() => {
                    warn!("Skipping delegators of {}: {}", validator.moniker, e);
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };
            info!(
                "Validator {} with wallet {} has {} delegators",
                validator.moniker,
                validator.wallet_address,
                delegators.len()
            );
            report.delegators_seen += delegators.len();

            for delegator in delegators {
                if let Err(e) = store.ensure(&delegator) {
                    warn!("Skipping delegator of {}: {}", validator.moniker, e);
                }
            }
        }

        for pool in self.gateway.liquidity_pools().await? {
            report.pools += 1;
            match store.ensure(&pool.pool_address) {
                Ok(wallet) => {
                    wallet.username = Some(pool.name.clone());
                    info!("AMM pool {} fetched with wallet {}", pool.name, pool.pool_address);
                }
                Err(e) => warn!("Skipping pool {}: {}", pool.name, e),
            }
        }

        report.wallets_created = store.len() - known_before;
        info!(
            "Discovery finished: {} validators, {} delegations, {} pools, {} new wallets, {} total",
            report.validators,
            report.delegators_seen,
            report.pools,
            report.wallets_created,
            store.len()
        );
        Ok(report)
    }
}
