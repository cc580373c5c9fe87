//! Progress tracking for one scheduler cycle.
//!
//! This module provides the `CycleProgressTracker`, which counts refreshed and failed
//! wallets while the scheduler works through its stale set, logs `i/n` progress and
//! produces the summary logged at the end of the cycle.

use tracing::{info, warn};

/// Service for tracking the progress of a refresh cycle
#[derive(Debug, Clone)]
pub struct CycleProgressTracker {
    /// Chain height when the cycle started
    start_height: u64,
    /// Number of wallets selected for this cycle
    planned: usize,
    /// Wallets refreshed and committed
    refreshed: usize,
    /// Wallets whose refresh failed and stay stale
    failed: Vec<String>,
}

impl CycleProgressTracker {
    /// Create a tracker for `planned` refreshes starting at `start_height`.
    pub fn new(start_height: u64, planned: usize) -> Self {
        info!("Found {} wallets to update", planned);
        Self {
            start_height,
            planned,
            refreshed: 0,
            failed: Vec::new(),
        }
    }

    /// Record a committed refresh and log the running count.
    pub fn record_refreshed(&mut self, address: &str) {
        self.refreshed += 1;
        info!(
            address,
            "Updated {}/{} wallets.",
            self.processed(),
            self.planned
        );
    }

    /// Record a refresh that was given up on for this cycle.
    pub fn record_failed(&mut self, address: &str, error: &dyn std::fmt::Display) {
        self.failed.push(address.to_string());
        warn!(
            address,
            "Refresh failed ({}/{}), wallet stays stale: {}",
            self.processed(),
            self.planned,
            error
        );
    }

    pub fn processed(&self) -> usize {
        self.refreshed + self.failed.len()
    }

    /// Whether the richlist needs rebuilding after this cycle.
    pub fn has_refreshed(&self) -> bool {
        self.refreshed > 0
    }

    pub fn get_stats(&self) -> CycleStats {
        CycleStats {
            start_height: self.start_height,
            planned: self.planned,
            refreshed: self.refreshed,
            failed: self.failed.clone(),
        }
    }
}

/// Statistics about a finished cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub start_height: u64,
    pub planned: usize,
    pub refreshed: usize,
    pub failed: Vec<String>,
}

impl CycleStats {
    /// Get a human-readable summary of the cycle
    pub fn summary(&self) -> String {
        format!(
            "Cycle at height {}: {}/{} wallets refreshed{}",
            self.start_height,
            self.refreshed,
            self.planned,
            if self.failed.is_empty() {
                String::new()
            } else {
                format!(" ({} failed)", self.failed.len())
            }
        )
    }
}
