//! Wallet Synchronization Module
//!
//! This module provides the services that keep the wallet store in step with the chain:
//!
//! - `scheduler`: The main loop. Decides each cycle which wallets are stale, triggers full
//!   rediscovery on large drift and rebuilds the richlist.
//! - `discovery`: Finds wallets through validators, their delegators and liquidity pools.
//! - `updater`: Refreshes a single wallet, handling role demotion and transient failures.
//! - `store`: In-memory index of all wallets, mirrored to durable snapshots.
//! - `repositories`: Snapshot persistence.
//! - `progress_tracker`: Per-cycle progress and statistics.

/// Wallet discovery through staking and liquidity pool endpoints
pub mod discovery;
/// Tracks progress and statistics of a sync cycle
pub mod progress_tracker;
/// Snapshot persistence for wallets
pub mod repositories;
/// Main control loop of the sync engine
pub mod scheduler;
/// In-memory wallet index backed by a repository
pub mod store;
/// Refresh state machine for a single wallet
pub mod updater;

pub use repositories::{FileWalletRepository, WalletRepository};
pub use scheduler::{SchedulerSettings, SyncScheduler};
pub use store::WalletStore;
