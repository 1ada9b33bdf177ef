//! Cost/quality analysis models produced by the optimizer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::ServiceType;
use crate::requests::RequestStatus;

/// Relative importance of each sub-score in the composite score
///
/// Always normalized so the four weights sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OptimizerWeights {
	pub cost: f64,
	pub reliability: f64,
	pub performance: f64,
	pub quality: f64,
}

impl Default for OptimizerWeights {
	fn default() -> Self {
		Self {
			cost: 0.40,
			reliability: 0.25,
			performance: 0.20,
			quality: 0.15,
		}
	}
}

impl OptimizerWeights {
	pub fn sum(&self) -> f64 {
		self.cost + self.reliability + self.performance + self.quality
	}

	fn values(&self) -> [f64; 4] {
		[self.cost, self.reliability, self.performance, self.quality]
	}

	/// Scale the weights so they sum to 1
	///
	/// Returns `None` when a weight is negative or not finite, or when every
	/// weight is zero.
	pub fn normalized(&self) -> Option<Self> {
		if self
			.values()
			.iter()
			.any(|weight| !weight.is_finite() || *weight < 0.0)
		{
			return None;
		}
		let sum = self.sum();
		if sum <= 0.0 {
			return None;
		}
		Some(Self {
			cost: self.cost / sum,
			reliability: self.reliability / sum,
			performance: self.performance / sum,
			quality: self.quality / sum,
		})
	}

	/// Overlay a partial update on top of these weights (not normalized)
	pub fn merged(&self, update: &WeightsUpdate) -> Self {
		Self {
			cost: update.cost.unwrap_or(self.cost),
			reliability: update.reliability.unwrap_or(self.reliability),
			performance: update.performance.unwrap_or(self.performance),
			quality: update.quality.unwrap_or(self.quality),
		}
	}
}

/// Partial weight update; unset fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeightsUpdate {
	pub cost: Option<f64>,
	pub reliability: Option<f64>,
	pub performance: Option<f64>,
	pub quality: Option<f64>,
}

/// Normalized sub-scores, each in [0, 100]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SubScores {
	pub cost: f64,
	pub reliability: f64,
	pub performance: f64,
	pub quality: f64,
}

impl SubScores {
	pub fn composite(&self, weights: &OptimizerWeights) -> f64 {
		self.cost * weights.cost
			+ self.reliability * weights.reliability
			+ self.performance * weights.performance
			+ self.quality * weights.quality
	}
}

/// Per-provider result of an optimization pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderAnalysis {
	pub provider_id: String,
	pub provider_name: String,
	pub estimated_cost: f64,
	pub composite_score: f64,
	pub sub_scores: SubScores,
	pub pros: Vec<String>,
	pub cons: Vec<String>,
	/// 1-based position in the ranking
	pub rank: usize,
}

/// Recommended provider plus ranked fallbacks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
	pub primary_provider_id: String,
	/// At most two backups, in rank order
	pub backup_provider_ids: Vec<String>,
	pub reasoning: String,
	/// Confidence in the primary choice (0-95)
	pub confidence: f64,
	pub expected_savings: f64,
}

/// Full result of `analyze`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostAnalysis {
	pub request_type: ServiceType,
	/// Analyses sorted by rank
	pub analyses: Vec<ProviderAnalysis>,
	pub recommendation: Recommendation,
	pub analyzed_at: DateTime<Utc>,
}

impl CostAnalysis {
	pub fn analysis_for(&self, provider_id: &str) -> Option<&ProviderAnalysis> {
		self.analyses
			.iter()
			.find(|analysis| analysis.provider_id == provider_id)
	}

	pub fn primary(&self) -> Option<&ProviderAnalysis> {
		self.analysis_for(&self.recommendation.primary_provider_id)
	}
}

/// Outcome of a past request execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalRecord {
	pub request_id: String,
	pub provider_id: String,
	pub status: RequestStatus,
	pub response_time_ms: u64,
	pub cost: f64,
	pub timestamp: DateTime<Utc>,
}

/// Aggregated execution statistics over a time window
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageMetrics {
	pub total_requests: u64,
	pub successful_payments: u64,
	pub failed_payments: u64,
	pub total_volume: f64,
	pub average_response_time_ms: f64,
}

impl UsageMetrics {
	/// Summarize the records newer than `since`
	pub fn from_records<'a>(
		records: impl IntoIterator<Item = &'a HistoricalRecord>,
		since: DateTime<Utc>,
	) -> Self {
		let mut metrics = UsageMetrics::default();
		let mut total_response_ms = 0u64;

		for record in records.into_iter().filter(|r| r.timestamp >= since) {
			metrics.total_requests += 1;
			total_response_ms = total_response_ms.saturating_add(record.response_time_ms);
			if record.status == RequestStatus::Completed {
				metrics.successful_payments += 1;
				metrics.total_volume += record.cost;
			} else {
				metrics.failed_payments += 1;
			}
		}

		if metrics.total_requests > 0 {
			metrics.average_response_time_ms =
				total_response_ms as f64 / metrics.total_requests as f64;
		}
		metrics
	}
}
