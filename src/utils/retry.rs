use crate::gateway::GatewayError;
use std::time::Duration;

/// How long to wait before retrying after a transient gateway failure.
///
/// A syncing node takes much longer to recover than a dropped request, so each kind
/// gets its own fixed delay. `max_attempts` bounds how many times a single operation is
/// started; `None` retries forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub timeout_backoff: Duration,
	pub catching_up_backoff: Duration,
	pub max_attempts: Option<u32>,
}

impl RetryPolicy {
	/// The wait for a transient error, or `None` if the error should not be retried.
	pub fn delay_for(&self, error: &GatewayError) -> Option<Duration> {
		match error {
			GatewayError::RequestTimedOut { .. } => Some(self.timeout_backoff),
			GatewayError::NodeIsCatchingUp => Some(self.catching_up_backoff),
			_ => None,
		}
	}

	/// Whether another attempt may start after `attempts` have already been made.
	pub fn allows_another(&self, attempts: u32) -> bool {
		self.max_attempts.is_none_or(|max| attempts < max)
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			timeout_backoff: Duration::from_secs(30),
			catching_up_backoff: Duration::from_secs(60),
			max_attempts: None,
		}
	}
}
