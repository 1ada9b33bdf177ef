//! Cancellable recurring health-check task

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Periodic check loop for one provider
///
/// Each tick spawns the check on its own task, so a check that outlasts the
/// period overlaps with the next one instead of delaying it. Dropping the
/// handle cancels the loop; checks already spawned run to completion.
#[derive(Debug)]
pub struct HealthCheckTask {
	provider_id: String,
	period: Duration,
	handle: JoinHandle<()>,
}

impl HealthCheckTask {
	/// Start ticking `check` every `period`, first tick one period from now
	pub fn spawn<F, Fut>(provider_id: impl Into<String>, period: Duration, check: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let provider_id = provider_id.into();
		let period = period.max(Duration::from_millis(1));
		let task_provider = provider_id.clone();

		let handle = tokio::spawn(async move {
			let mut ticker = interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			loop {
				ticker.tick().await;
				debug!("Running scheduled health check for {}", task_provider);
				tokio::spawn(check());
			}
		});

		Self {
			provider_id,
			period,
			handle,
		}
	}

	pub fn provider_id(&self) -> &str {
		&self.provider_id
	}

	pub fn period(&self) -> Duration {
		self.period
	}

	pub fn is_running(&self) -> bool {
		!self.handle.is_finished()
	}

	pub fn cancel(&self) {
		if !self.handle.is_finished() {
			debug!("Cancelling health checks for {}", self.provider_id);
			self.handle.abort();
		}
	}
}

impl Drop for HealthCheckTask {
	fn drop(&mut self) {
		self.handle.abort();
	}
}
