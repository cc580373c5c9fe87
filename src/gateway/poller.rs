use super::{ChainGateway, ChainHead};
use crate::utils::{RetryPolicy, Shutdown};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Polls the gateway for the latest block and publishes it to the rest of the engine.
///
/// The poller is the only writer of the chain head; the scheduler and anything else
/// that needs the current height hold a receiver.
pub struct HeightPoller {
	gateway: Arc<dyn ChainGateway>,
	interval: Duration,
	policy: RetryPolicy,
	sender: watch::Sender<Option<ChainHead>>,
}

impl HeightPoller {
	/// Create a poller and the receiver observing its chain head.
	pub fn new(
		gateway: Arc<dyn ChainGateway>,
		interval: Duration,
		policy: RetryPolicy,
	) -> (Self, watch::Receiver<Option<ChainHead>>) {
		let (sender, receiver) = watch::channel(None);
		(
			Self {
				gateway,
				interval,
				policy,
				sender,
			},
			receiver,
		)
	}

	/// Run until shutdown is signalled.
	pub async fn run(self, mut shutdown: Shutdown) {
		info!("Starting block height poller");

		while !shutdown.is_triggered() {
			let wait = match self.gateway.latest_block().await {
				Ok(head) => {
					debug!(height = head.height, time = %head.time, "Fetched latest block");
					self.sender.send_if_modified(|current| {
						if current.as_ref() == Some(&head) {
							false
						} else {
							*current = Some(head);
							true
						}
					});
					self.interval
				}
				Err(e) => match self.policy.delay_for(&e) {
					Some(delay) => {
						warn!(
							"Requesting latest block failed ({}), wait {}s and retry",
							e,
							delay.as_secs()
						);
						delay
					}
					None => {
						warn!(error = %e, "Requesting latest block failed");
						self.interval
					}
				},
			};

			if !shutdown.sleep(wait).await {
				break;
			}
		}

		info!("Block height poller stopped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gateway::GatewayError;
	use crate::gateway::mock::{MockGateway, head};

	#[tokio::test]
	async fn test_publishes_latest_head() {
		let gateway = Arc::new(MockGateway::default());
		gateway.set_head(head(120));
		gateway.fail_next("latest_block", GatewayError::NodeIsCatchingUp);

		let policy = RetryPolicy {
			timeout_backoff: Duration::from_millis(1),
			catching_up_backoff: Duration::from_millis(1),
			max_attempts: None,
		};
		let (poller, mut heads) = HeightPoller::new(gateway.clone(), Duration::from_millis(1), policy);
		let (trigger, shutdown) = Shutdown::channel();
		let task = tokio::spawn(poller.run(shutdown));

		heads.changed().await.unwrap();
		assert_eq!(heads.borrow().as_ref().map(|h| h.height), Some(120));

		trigger.send(true).unwrap();
		task.await.unwrap();
		assert!(gateway.calls("latest_block") >= 2);
	}
}
