//! Payment job models used by the scheduler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::requests::Priority;

/// Retry policy for payment jobs
///
/// Delay before attempt `n + 1` is `base_delay_ms * multiplier^(n - 1)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
	/// Total attempts including the first one
	pub max_attempts: u32,
	/// Delay after the first failed attempt
	pub base_delay_ms: u64,
	/// Exponential backoff multiplier (1.0 = fixed delay)
	pub multiplier: f64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay_ms: 2000,
			multiplier: 2.0,
		}
	}
}

impl RetryPolicy {
	/// No retries at all
	pub fn none() -> Self {
		Self {
			max_attempts: 1,
			base_delay_ms: 0,
			multiplier: 1.0,
		}
	}

	/// Backoff to wait after `failed_attempts` failures
	pub fn delay_after(&self, failed_attempts: u32) -> Duration {
		let exponent = failed_attempts.saturating_sub(1).min(16) as i32;
		let multiplier = if self.multiplier.is_finite() && self.multiplier > 0.0 {
			self.multiplier
		} else {
			1.0
		};
		let millis = self.base_delay_ms as f64 * multiplier.powi(exponent);
		Duration::from_millis(millis.min(u64::MAX as f64) as u64)
	}

	pub fn should_retry(&self, attempts: u32) -> bool {
		attempts < self.max_attempts
	}
}

/// Execution state of a payment job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobState {
	/// Queued, not yet picked up
	Waiting,
	/// Waiting for its scheduled start or retry backoff
	Delayed { until: DateTime<Utc> },
	/// Picked up by a worker
	Active,
	Completed,
	/// Terminal failure (retries exhausted or aborted)
	Failed { error: String },
	Cancelled,
}

impl JobState {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobState::Waiting => "waiting",
			JobState::Delayed { .. } => "delayed",
			JobState::Active => "active",
			JobState::Completed => "completed",
			JobState::Failed { .. } => "failed",
			JobState::Cancelled => "cancelled",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			JobState::Completed | JobState::Failed { .. } | JobState::Cancelled
		)
	}
}

/// A queued payment-bearing call to a provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentJob {
	pub id: String,
	pub request_id: String,
	pub user_id: String,
	pub provider_id: String,
	pub amount: f64,
	pub priority_score: u32,
	/// Attempts made in the current run
	pub attempts: u32,
	pub max_attempts: u32,
	pub backoff: RetryPolicy,
	pub state: JobState,
	/// Error of every failed attempt, oldest first, across manual retries
	pub attempt_errors: Vec<String>,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub finished_at: Option<DateTime<Utc>>,
}

impl PaymentJob {
	pub fn new(
		id: String,
		request_id: String,
		user_id: String,
		provider_id: String,
		amount: f64,
		priority: Priority,
		backoff: RetryPolicy,
	) -> Self {
		Self {
			id,
			request_id,
			user_id,
			provider_id,
			amount,
			priority_score: priority.weight(),
			attempts: 0,
			max_attempts: backoff.max_attempts.max(1),
			backoff,
			state: JobState::Waiting,
			attempt_errors: Vec::new(),
			created_at: Utc::now(),
			started_at: None,
			finished_at: None,
		}
	}

	pub fn last_error(&self) -> Option<&str> {
		self.attempt_errors.last().map(String::as_str)
	}

	pub fn has_started(&self) -> bool {
		self.started_at.is_some()
	}
}

/// Per-call scheduling options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleOptions {
	/// Amount to charge; defaults to the request's estimated cost
	pub amount: Option<f64>,
	/// Override of the scheduler's retry policy
	pub retry_policy: Option<RetryPolicy>,
	/// Delay before the job becomes eligible
	pub delay_ms: Option<u64>,
}

impl ScheduleOptions {
	pub fn with_amount(amount: f64) -> Self {
		Self {
			amount: Some(amount),
			..Default::default()
		}
	}
}

/// Counters exposed by `get_queue_stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueueStats {
	pub waiting: usize,
	pub delayed: usize,
	pub active: usize,
	pub completed: usize,
	pub failed: usize,
	pub cancelled: usize,
	pub paused: bool,
}

/// Result of a budget limit check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetCheck {
	pub can_proceed: bool,
	pub daily_exceeded: bool,
	pub monthly_exceeded: bool,
	pub emergency_stop: bool,
	pub remaining_daily: f64,
	pub remaining_monthly: f64,
}

impl BudgetCheck {
	/// Human-readable reason for a refusal
	pub fn denial_reason(&self) -> String {
		let mut reasons = Vec::new();
		if self.emergency_stop {
			reasons.push("emergency stop active");
		}
		if self.daily_exceeded {
			reasons.push("daily limit exceeded");
		}
		if self.monthly_exceeded {
			reasons.push("monthly limit exceeded");
		}
		if reasons.is_empty() {
			reasons.push("budget check refused");
		}
		reasons.join(", ")
	}
}

/// Payload returned by a provider service call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceResponse {
	pub data: Value,
	pub response_time_ms: u64,
	pub status_code: Option<u16>,
}

/// Confirmation of a settled payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentReceipt {
	pub transaction_id: String,
	pub amount: f64,
	pub settled_at: DateTime<Utc>,
}

/// Aggregate liveness of the scheduler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerHealth {
	pub healthy: bool,
	pub accepting_jobs: bool,
	pub paused: bool,
	pub workers_alive: usize,
	pub workers_total: usize,
	pub queue_depth: usize,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_exponential_backoff() {
		let policy = RetryPolicy {
			max_attempts: 4,
			base_delay_ms: 100,
			multiplier: 2.0,
		};
		assert_eq!(policy.delay_after(1), Duration::from_millis(100));
		assert_eq!(policy.delay_after(2), Duration::from_millis(200));
		assert_eq!(policy.delay_after(3), Duration::from_millis(400));
	}

	#[test]
	fn test_fixed_backoff_with_invalid_multiplier() {
		let policy = RetryPolicy {
			max_attempts: 3,
			base_delay_ms: 50,
			multiplier: f64::NAN,
		};
		assert_eq!(policy.delay_after(3), Duration::from_millis(50));
	}

	#[test]
	fn test_should_retry() {
		let policy = RetryPolicy::default();
		assert!(policy.should_retry(1));
		assert!(policy.should_retry(2));
		assert!(!policy.should_retry(3));
		assert!(!RetryPolicy::none().should_retry(1));
	}

	#[test]
	fn test_new_job_uses_priority_weight() {
		let job = PaymentJob::new(
			"job-1".to_string(),
			"req-1".to_string(),
			"user-1".to_string(),
			"prov-1".to_string(),
			0.5,
			Priority::High,
			RetryPolicy::default(),
		);
		assert_eq!(job.priority_score, 7);
		assert_eq!(job.state, JobState::Waiting);
		assert_eq!(job.max_attempts, 3);
		assert!(!job.has_started());
	}

	#[test]
	fn test_denial_reason() {
		let check = BudgetCheck {
			can_proceed: false,
			daily_exceeded: true,
			monthly_exceeded: false,
			emergency_stop: false,
			remaining_daily: 0.0,
			remaining_monthly: 10.0,
		};
		assert_eq!(check.denial_reason(), "daily limit exceeded");
	}
}
