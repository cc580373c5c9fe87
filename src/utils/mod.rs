//!
//! Utility module for the richlist engine.
//!
//! Re-exports amount helpers, retry policy and the shutdown signal used throughout the codebase.
/// Decimal amount conversion and formatting
pub mod amount;
/// Per-error-kind wait times for transient gateway failures
pub mod retry;
/// Cooperative shutdown signal for long-running loops
pub mod shutdown;

pub use amount::{parse_amount, raw_to_decimal, to_precision};
pub use retry::RetryPolicy;
pub use shutdown::Shutdown;
