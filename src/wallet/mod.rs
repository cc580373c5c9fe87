//! Wallet model and synchronization
//!
//! Wallet records with their per-asset balance ledger, the decimal precision cache and
//! the services that keep wallets in step with the chain.

/// Per-asset balance components and their merge rules
pub mod balance;
/// Cache of asset decimal precision
pub mod decimals;
/// Discovery, refresh and scheduling of wallet updates
pub mod sync;
/// Wallet record, address validation and error types
pub mod types;

pub use balance::{BalanceComponents, BalanceDelta};
pub use decimals::DecimalRegistry;
pub use types::*;
