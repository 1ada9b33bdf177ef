//! In-memory per-user budget ledger
//!
//! Spends are timestamped; the daily window starts at UTC midnight and the
//! monthly window on the first day of the UTC month.

use async_trait::async_trait;
use broker_types::{BudgetCheck, BudgetService, StorageResult};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Spending limits of one user
#[derive(Debug, Clone, PartialEq)]
pub struct UserLimits {
	pub daily_limit: f64,
	pub monthly_limit: f64,
	pub emergency_stop: bool,
}

#[derive(Debug, Clone)]
struct SpendRecord {
	amount: f64,
	at: DateTime<Utc>,
}

/// Budget service backed by DashMap
#[derive(Clone)]
pub struct MemoryBudgetLedger {
	default_limits: UserLimits,
	limits: Arc<DashMap<String, UserLimits>>,
	spends: Arc<DashMap<String, Vec<SpendRecord>>>,
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
	Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
		.single()
		.unwrap_or(now)
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
	Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
		.single()
		.unwrap_or(now)
}

impl MemoryBudgetLedger {
	/// Ledger applying the given limits to users without explicit ones
	pub fn new(default_daily_limit: f64, default_monthly_limit: f64) -> Self {
		Self {
			default_limits: UserLimits {
				daily_limit: default_daily_limit,
				monthly_limit: default_monthly_limit,
				emergency_stop: false,
			},
			limits: Arc::new(DashMap::new()),
			spends: Arc::new(DashMap::new()),
		}
	}

	pub fn set_limits(&self, user_id: &str, daily_limit: f64, monthly_limit: f64) {
		let mut entry = self
			.limits
			.entry(user_id.to_string())
			.or_insert_with(|| self.default_limits.clone());
		entry.daily_limit = daily_limit;
		entry.monthly_limit = monthly_limit;
	}

	/// Block (or unblock) all spending for a user
	pub fn set_emergency_stop(&self, user_id: &str, stop: bool) {
		let mut entry = self
			.limits
			.entry(user_id.to_string())
			.or_insert_with(|| self.default_limits.clone());
		entry.emergency_stop = stop;
		if stop {
			warn!("Emergency stop enabled for user {}", user_id);
		}
	}

	pub fn limits_for(&self, user_id: &str) -> UserLimits {
		self.limits
			.get(user_id)
			.map(|limits| limits.clone())
			.unwrap_or_else(|| self.default_limits.clone())
	}

	/// Total recorded spend since `since`
	pub fn spent_since(&self, user_id: &str, since: DateTime<Utc>) -> f64 {
		self.spends
			.get(user_id)
			.map(|records| {
				records
					.iter()
					.filter(|record| record.at >= since)
					.map(|record| record.amount)
					.sum()
			})
			.unwrap_or(0.0)
	}

	pub fn spent_today(&self, user_id: &str) -> f64 {
		self.spent_since(user_id, start_of_day(Utc::now()))
	}

	pub fn spent_this_month(&self, user_id: &str) -> f64 {
		self.spent_since(user_id, start_of_month(Utc::now()))
	}

	/// Evaluate `amount` against the limits at `now`
	fn evaluate(&self, user_id: &str, amount: f64, now: DateTime<Utc>) -> BudgetCheck {
		let limits = self.limits_for(user_id);
		let spent_daily = self.spent_since(user_id, start_of_day(now));
		let spent_monthly = self.spent_since(user_id, start_of_month(now));

		let remaining_daily = (limits.daily_limit - spent_daily).max(0.0);
		let remaining_monthly = (limits.monthly_limit - spent_monthly).max(0.0);
		let daily_exceeded = spent_daily + amount > limits.daily_limit;
		let monthly_exceeded = spent_monthly + amount > limits.monthly_limit;

		BudgetCheck {
			can_proceed: amount.is_finite()
				&& amount >= 0.0
				&& !daily_exceeded
				&& !monthly_exceeded
				&& !limits.emergency_stop,
			daily_exceeded,
			monthly_exceeded,
			emergency_stop: limits.emergency_stop,
			remaining_daily,
			remaining_monthly,
		}
	}
}

#[async_trait]
impl BudgetService for MemoryBudgetLedger {
	async fn check_limits(&self, user_id: &str, amount: f64) -> StorageResult<BudgetCheck> {
		Ok(self.evaluate(user_id, amount, Utc::now()))
	}

	async fn record_spend(&self, user_id: &str, amount: f64) -> StorageResult<()> {
		let now = Utc::now();
		let month_start = start_of_month(now);
		let mut records = self.spends.entry(user_id.to_string()).or_default();
		// Only the current month matters for any limit
		records.retain(|record| record.at >= month_start);
		records.push(SpendRecord { amount, at: now });
		debug!("Recorded spend of {:.6} for user {}", amount, user_id);
		Ok(())
	}
}
