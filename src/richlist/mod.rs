//! Per-asset richlist
//!
//! The aggregator ranks every known wallet per asset after each sync cycle and publishes
//! the result as one immutable value; readers page through the latest published value.

/// Ranking and publishing of the richlist
mod aggregator;
/// Read-side paging over the published richlist
mod query;

pub use aggregator::RichlistAggregator;
pub use query::{QueryError, RichlistReader};
