//! Sync scheduler and main loop of the richlist engine.
//!
//! This module defines the `SyncScheduler`, which owns the wallet store and decides each
//! cycle what needs to be synchronized:
//! - a full rediscovery of wallets when the chain moved far past the last one
//! - a refresh of every wallet whose last refresh lags too far behind the chain head
//! - a rebuild of the richlist once any wallet changed
//!
//! The chain head is read from the height poller's watch channel. Refreshes run one after
//! another and each is stamped with the head that was current when it started.

use crate::gateway::{ChainGateway, ChainHead};
use crate::richlist::RichlistAggregator;
use crate::utils::{RetryPolicy, Shutdown};
use crate::wallet::WalletSyncError;
use crate::wallet::sync::{
    discovery::DiscoveryScanner,
    progress_tracker::{CycleProgressTracker, CycleStats},
    store::WalletStore,
    updater::WalletUpdater,
};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Thresholds and pacing of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Pause between two cycles.
    pub cycle_interval: Duration,
    /// A wallet is refreshed once it lags more than this many blocks.
    pub max_wallet_stale_drift: u64,
    /// Wallets are rediscovered once the chain moved more than this many blocks.
    pub max_full_rescan_drift: u64,
    /// Asset that unbonding entries are attributed to.
    pub staking_denom: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(10),
            max_wallet_stale_drift: 2000,
            max_full_rescan_drift: 5000,
            staking_denom: "swth".to_string(),
        }
    }
}

/// Main sync loop. Owns the wallet store exclusively.
pub struct SyncScheduler {
    store: WalletStore,
    updater: WalletUpdater,
    discovery: DiscoveryScanner,
    aggregator: RichlistAggregator,
    heads: watch::Receiver<Option<ChainHead>>,
    settings: SchedulerSettings,
    policy: RetryPolicy,
    shutdown: Shutdown,
    last_full_rescan_height: u64,
}

impl SyncScheduler {
    /// Create the scheduler and publish the richlist of the rehydrated store.
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        store: WalletStore,
        aggregator: RichlistAggregator,
        heads: watch::Receiver<Option<ChainHead>>,
        settings: SchedulerSettings,
        policy: RetryPolicy,
        shutdown: Shutdown,
    ) -> Self {
        let updater = WalletUpdater::new(
            gateway.clone(),
            policy,
            settings.staking_denom.clone(),
            shutdown.clone(),
        );
        let discovery = DiscoveryScanner::new(gateway);
        let last_full_rescan_height = store.lowest_checked_height();

        aggregator.rebuild(store.wallets());
        info!(
            "Loaded {} wallets, lowest block height: {}",
            store.len(),
            last_full_rescan_height
        );

        Self {
            store,
            updater,
            discovery,
            aggregator,
            heads,
            settings,
            policy,
            shutdown,
            last_full_rescan_height,
        }
    }

    /// Run cycles until shutdown is signalled.
    pub async fn run(mut self) {
        info!("Starting sync scheduler");

        while !self.shutdown.is_triggered() {
            let wait = match self.run_cycle().await {
                Ok(stats) => {
                    info!("{}", stats.summary());
                    self.settings.cycle_interval
                }
                Err(WalletSyncError::Shutdown) => break,
                Err(e) => match e
                    .transient_gateway_error()
                    .and_then(|g| self.policy.delay_for(g))
                {
                    Some(delay) => {
                        warn!(
                            "Sync cycle interrupted ({}), wait {}s and retry",
                            e,
                            delay.as_secs()
                        );
                        delay
                    }
                    None => {
                        error!(error = %e, "Sync cycle failed");
                        self.settings.cycle_interval
                    }
                },
            };

            if !self.shutdown.sleep(wait).await {
                break;
            }
        }

        info!("Sync scheduler stopped");
    }

    /// One pass: rediscover if due, refresh stale wallets, rebuild the richlist.
    pub async fn run_cycle(&mut self) -> Result<CycleStats, WalletSyncError> {
        let head = self.wait_for_head().await?;
        info!(height = head.height, "Current block {} - {}", head.height, head.time);

        if head.height.saturating_sub(self.last_full_rescan_height)
            > self.settings.max_full_rescan_drift
        {
            match self.discovery.rediscover_all(&mut self.store).await {
                Ok(_) => self.last_full_rescan_height = head.height,
                Err(e) if e.transient_gateway_error().is_some() => return Err(e),
                Err(e) => {
                    error!(error = %e, "Wallet discovery failed, refreshing known wallets only")
                }
            }
        }

        let stale = self
            .store
            .stale_addresses(head.height, self.settings.max_wallet_stale_drift);
        let mut progress = CycleProgressTracker::new(head.height, stale.len());

        for address in stale {
            if self.shutdown.is_triggered() {
                return Err(WalletSyncError::Shutdown);
            }
            let Some(wallet) = self.store.get(&address).cloned() else {
                continue;
            };
            let current = self.heads.borrow().clone().unwrap_or_else(|| head.clone());

            match self.updater.refresh(&wallet, &current).await {
                Ok(refreshed) => match self.store.commit(refreshed).await {
                    Ok(()) => progress.record_refreshed(&address),
                    Err(e) => progress.record_failed(&address, &e),
                },
                Err(WalletSyncError::Shutdown) => return Err(WalletSyncError::Shutdown),
                Err(e) => progress.record_failed(&address, &e),
            }
        }

        if progress.has_refreshed() {
            self.aggregator.rebuild(self.store.wallets());
        }

        Ok(progress.get_stats())
    }

    /// The latest chain head, waiting for the poller's first one if needed.
    async fn wait_for_head(&mut self) -> Result<ChainHead, WalletSyncError> {
        loop {
            if let Some(head) = self.heads.borrow_and_update().clone() {
                return Ok(head);
            }
            info!("Waiting for the first chain head");
            tokio::select! {
                changed = self.heads.changed() => {
                    // The poller only goes away on shutdown.
                    if changed.is_err() {
                        return Err(WalletSyncError::Shutdown);
                    }
                }
                _ = self.shutdown.triggered() => return Err(WalletSyncError::Shutdown),
            }
        }
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }
}
