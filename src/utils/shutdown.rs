use std::time::Duration;
use tokio::sync::watch;

/// Receiving side of the process-wide shutdown signal.
///
/// Long-running loops check it at every iteration boundary and sleep through
/// [`Shutdown::sleep`] so that a pending backoff does not delay shutdown.
#[derive(Debug, Clone)]
pub struct Shutdown {
	rx: watch::Receiver<bool>,
}

impl Shutdown {
	/// Create the trigger and its first receiver.
	pub fn channel() -> (watch::Sender<bool>, Shutdown) {
		let (tx, rx) = watch::channel(false);
		(tx, Shutdown { rx })
	}

	pub fn is_triggered(&self) -> bool {
		*self.rx.borrow()
	}

	/// Sleep for `duration`. Returns `false` if shutdown was signalled before it elapsed.
	pub async fn sleep(&mut self, duration: Duration) -> bool {
		let deadline = tokio::time::sleep(duration);
		tokio::pin!(deadline);

		loop {
			if self.is_triggered() {
				return false;
			}
			tokio::select! {
				_ = &mut deadline => return true,
				changed = self.rx.changed() => {
					if changed.is_err() {
						// Trigger dropped, nobody can signal anymore.
						(&mut deadline).await;
						return true;
					}
				}
			}
		}
	}

	/// Resolve once shutdown has been signalled.
	pub async fn triggered(&mut self) {
		loop {
			if self.is_triggered() {
				return;
			}
			if self.rx.changed().await.is_err() {
				std::future::pending::<()>().await;
			}
		}
	}
}
