//! Cost/quality provider ranking
//!
//! Scores every active provider of the requested service type on four
//! normalized criteria (cost, reliability, performance, quality), combines
//! them with configurable weights and recommends the best provider together
//! with up to two ranked fallbacks.

use broker_config::OptimizerSettings;
use broker_types::{
	CostAnalysis, HistoricalRecord, OptimizerWeights, PricingKind, Provider, ProviderAnalysis,
	QualityMetrics, Recommendation, RequestStatus, ServiceRequest, ServiceType, SubScores,
	WeightsUpdate,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info};

/// Response time at or below which performance scores 100
const FAST_RESPONSE_MS: f64 = 100.0;
/// Response time at or above which performance scores 10
const SLOW_RESPONSE_MS: f64 = 5000.0;
const MIN_PERFORMANCE_SCORE: f64 = 10.0;
const MAX_CONFIDENCE: f64 = 95.0;
const MAX_BACKUPS: usize = 2;

/// Errors raised by the optimizer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
	#[error("No active providers available for {service_type}")]
	NoProvidersAvailable { service_type: ServiceType },

	#[error("Invalid optimizer weights: {reason}")]
	InvalidWeights { reason: String },
}

/// Latest monitored quality of a provider
///
/// Returns `None` when the source has no recent data, in which case the
/// provider's own snapshot is used.
#[cfg_attr(test, mockall::automock)]
pub trait QualityMetricsSource: Send + Sync {
	fn quality_metrics(&self, provider_id: &str) -> Option<QualityMetrics>;
}

/// Trait for provider ranking
#[cfg_attr(test, mockall::automock)]
pub trait CostOptimizerTrait: Send + Sync {
	/// Rank the active providers of `request_type` for `request`
	fn analyze(
		&self,
		request_type: ServiceType,
		providers: &[Provider],
		request: &ServiceRequest,
	) -> Result<CostAnalysis, OptimizerError>;

	/// Merge `update` into the current weights and renormalize
	fn update_weights(&self, update: WeightsUpdate) -> Result<OptimizerWeights, OptimizerError>;

	fn weights(&self) -> OptimizerWeights;

	/// Provider with the most fast, completed executions in `history`
	fn predict_optimal_choice(&self, history: &[HistoricalRecord]) -> Option<String>;
}

/// Weighted-heuristic optimizer
pub struct CostOptimizer {
	settings: OptimizerSettings,
	weights: RwLock<OptimizerWeights>,
	metrics_source: Option<Arc<dyn QualityMetricsSource>>,
}

impl CostOptimizer {
	/// Create an optimizer with normalized configured weights
	pub fn new(settings: OptimizerSettings) -> Result<Self, OptimizerError> {
		let weights = OptimizerWeights::from(&settings.weights)
			.normalized()
			.ok_or_else(|| OptimizerError::InvalidWeights {
				reason: "configured weights must be finite, non-negative and not all zero"
					.to_string(),
			})?;
		Ok(Self {
			settings,
			weights: RwLock::new(weights),
			metrics_source: None,
		})
	}

	/// Enrich provider metrics from a monitor before scoring
	pub fn with_metrics_source(mut self, source: Arc<dyn QualityMetricsSource>) -> Self {
		self.metrics_source = Some(source);
		self
	}

	/// Cost of serving `request` with `provider`
	pub fn estimate_cost(&self, provider: &Provider, request: &ServiceRequest) -> f64 {
		let pricing = &provider.pricing;
		if pricing.is_within_free_tier(provider.usage.requests_this_period) {
			return 0.0;
		}

		let cost = match pricing.kind {
			PricingKind::PerRequest => provider.current_unit_price(),
			PricingKind::PerUnitSize => {
				let payload_kb = request
					.numeric_parameter("payload_kb")
					.unwrap_or(self.settings.default_payload_kb);
				pricing.base_price * payload_kb
			},
			PricingKind::PerTime => {
				let duration_secs = request
					.numeric_parameter("duration_secs")
					.unwrap_or(self.settings.default_duration_secs);
				pricing.base_price * duration_secs
			},
			PricingKind::Subscription => {
				pricing.base_price / self.settings.subscription_monthly_volume.max(1.0)
			},
		};
		cost.max(0.0)
	}

	fn enriched(&self, provider: &Provider) -> Provider {
		let mut provider = provider.clone();
		if let Some(metrics) = self
			.metrics_source
			.as_ref()
			.and_then(|source| source.quality_metrics(&provider.id))
		{
			provider.quality_metrics = metrics;
		}
		provider
	}

	fn current_weights(&self) -> OptimizerWeights {
		*self.weights.read().unwrap_or_else(PoisonError::into_inner)
	}
}

/// Cost sub-score: share of the budget left after paying
pub fn cost_score(estimated_cost: f64, max_budget: f64) -> f64 {
	if max_budget <= 0.0 || estimated_cost > max_budget {
		return 0.0;
	}
	((1.0 - estimated_cost / max_budget) * 100.0).clamp(0.0, 100.0)
}

/// Performance sub-score: log-interpolated between 100 ms and 5 s
pub fn performance_score(avg_response_time_ms: f64) -> f64 {
	if avg_response_time_ms.is_nan() || avg_response_time_ms >= SLOW_RESPONSE_MS {
		return MIN_PERFORMANCE_SCORE;
	}
	if avg_response_time_ms <= FAST_RESPONSE_MS {
		return 100.0;
	}
	let span = (SLOW_RESPONSE_MS / FAST_RESPONSE_MS).ln();
	100.0 - (100.0 - MIN_PERFORMANCE_SCORE) * (avg_response_time_ms / FAST_RESPONSE_MS).ln() / span
}

fn pass_through(value: f64) -> f64 {
	if value.is_finite() {
		value.clamp(0.0, 100.0)
	} else {
		0.0
	}
}

fn pros_and_cons(scores: &SubScores, estimated_cost: f64, max_budget: f64) -> (Vec<String>, Vec<String>) {
	let mut pros = Vec::new();
	let mut cons = Vec::new();

	if scores.cost > 80.0 {
		pros.push("very cost-effective".to_string());
	}
	if scores.reliability > 95.0 {
		pros.push("excellent uptime".to_string());
	}
	if scores.performance > 85.0 {
		pros.push("fast responses".to_string());
	}
	if scores.quality > 90.0 {
		pros.push("high accuracy".to_string());
	}
	if estimated_cost == 0.0 {
		pros.push("free tier available".to_string());
	}

	if scores.cost == 0.0 && estimated_cost > max_budget {
		cons.push("exceeds budget".to_string());
	} else if scores.cost < 30.0 {
		cons.push("expensive relative to budget".to_string());
	}
	if scores.reliability < 80.0 {
		cons.push("reliability concerns".to_string());
	}
	if scores.performance < 40.0 {
		cons.push("slow responses".to_string());
	}
	if scores.quality < 75.0 {
		cons.push("lower data accuracy".to_string());
	}

	(pros, cons)
}

fn reasoning(primary: &ProviderAnalysis, runner_up: Option<&ProviderAnalysis>) -> String {
	let mut text = format!(
		"{} ranks first with composite score {:.1} (cost {:.1}, reliability {:.1}, performance {:.1}, quality {:.1})",
		primary.provider_name,
		primary.composite_score,
		primary.sub_scores.cost,
		primary.sub_scores.reliability,
		primary.sub_scores.performance,
		primary.sub_scores.quality,
	);
	if let Some(runner_up) = runner_up {
		text.push_str(&format!(
			"; {:.1} points ahead of {}",
			primary.composite_score - runner_up.composite_score,
			runner_up.provider_name
		));
	}
	if !primary.pros.is_empty() {
		text.push_str(&format!("; strengths: {}", primary.pros.join(", ")));
	}
	text
}

impl CostOptimizerTrait for CostOptimizer {
	fn analyze(
		&self,
		request_type: ServiceType,
		providers: &[Provider],
		request: &ServiceRequest,
	) -> Result<CostAnalysis, OptimizerError> {
		let candidates: Vec<Provider> = providers
			.iter()
			.filter(|provider| provider.is_active && provider.service_type == request_type)
			.map(|provider| self.enriched(provider))
			.collect();

		if candidates.is_empty() {
			return Err(OptimizerError::NoProvidersAvailable {
				service_type: request_type,
			});
		}

		let weights = self.current_weights();
		let mut analyses: Vec<ProviderAnalysis> = candidates
			.iter()
			.map(|provider| {
				let estimated_cost = self.estimate_cost(provider, request);
				let metrics = &provider.quality_metrics;
				let sub_scores = SubScores {
					cost: cost_score(estimated_cost, request.max_budget),
					reliability: pass_through(metrics.reliability_score),
					performance: performance_score(metrics.avg_response_time_ms),
					quality: pass_through(metrics.data_accuracy),
				};
				let (pros, cons) = pros_and_cons(&sub_scores, estimated_cost, request.max_budget);
				ProviderAnalysis {
					provider_id: provider.id.clone(),
					provider_name: provider.name.clone(),
					estimated_cost,
					composite_score: sub_scores.composite(&weights),
					sub_scores,
					pros,
					cons,
					rank: 0,
				}
			})
			.collect();

		analyses.sort_by(|a, b| {
			b.composite_score
				.total_cmp(&a.composite_score)
				.then_with(|| a.provider_id.cmp(&b.provider_id))
		});
		for (index, analysis) in analyses.iter_mut().enumerate() {
			analysis.rank = index + 1;
		}

		let primary = &analyses[0];
		let runner_up = analyses.get(1);
		let second_score = runner_up.map_or(0.0, |analysis| analysis.composite_score);
		let confidence = (50.0 + 2.0 * (primary.composite_score - second_score)).clamp(0.0, MAX_CONFIDENCE);

		let (min_cost, max_cost) = analyses.iter().fold((f64::MAX, f64::MIN), |(min, max), a| {
			(min.min(a.estimated_cost), max.max(a.estimated_cost))
		});

		let recommendation = Recommendation {
			primary_provider_id: primary.provider_id.clone(),
			backup_provider_ids: analyses
				.iter()
				.skip(1)
				.take(MAX_BACKUPS)
				.map(|analysis| analysis.provider_id.clone())
				.collect(),
			reasoning: reasoning(primary, runner_up),
			confidence,
			expected_savings: (max_cost - min_cost).max(0.0),
		};

		info!(
			"Recommended {} for {} request {} (score {:.1}, confidence {:.0}, {} candidates)",
			recommendation.primary_provider_id,
			request_type,
			request.id,
			primary.composite_score,
			confidence,
			analyses.len()
		);

		Ok(CostAnalysis {
			request_type,
			analyses,
			recommendation,
			analyzed_at: Utc::now(),
		})
	}

	fn update_weights(&self, update: WeightsUpdate) -> Result<OptimizerWeights, OptimizerError> {
		let mut weights = self.weights.write().unwrap_or_else(PoisonError::into_inner);
		let normalized = weights.merged(&update).normalized().ok_or_else(|| {
			OptimizerError::InvalidWeights {
				reason: "weights must be finite, non-negative and not all zero".to_string(),
			}
		})?;
		*weights = normalized;
		debug!("Optimizer weights updated: {:?}", normalized);
		Ok(normalized)
	}

	fn weights(&self) -> OptimizerWeights {
		self.current_weights()
	}

	fn predict_optimal_choice(&self, history: &[HistoricalRecord]) -> Option<String> {
		let threshold = self.settings.success_response_threshold_ms;
		let mut successes: BTreeMap<&str, usize> = BTreeMap::new();
		for record in history.iter().filter(|record| {
			record.status == RequestStatus::Completed && record.response_time_ms < threshold
		}) {
			*successes.entry(record.provider_id.as_str()).or_insert(0) += 1;
		}

		// BTreeMap iterates ids ascending, so the first maximum wins ties
		let mut best: Option<(&str, usize)> = None;
		for (provider_id, count) in successes {
			if best.map_or(true, |(_, best_count)| count > best_count) {
				best = Some((provider_id, count));
			}
		}
		best.map(|(provider_id, _)| provider_id.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use broker_types::{PricingModel, PricingTier};
	use chrono::Duration;
	use serde_json::json;

	const EPSILON: f64 = 1e-9;

	fn optimizer() -> CostOptimizer {
		CostOptimizer::new(OptimizerSettings::default()).unwrap()
	}

	fn provider(id: &str, price: f64, reliability: f64) -> Provider {
		Provider::new(
			id,
			format!("Provider {}", id),
			ServiceType::Weather,
			format!("https://{}.example.com", id),
			PricingModel::per_request(price),
		)
		.with_quality(QualityMetrics::new(99.0, 200.0, reliability, 90.0))
	}

	fn request(max_budget: f64) -> ServiceRequest {
		ServiceRequest::new("req-1", "user-1", ServiceType::Weather, max_budget)
	}

	#[test]
	fn test_cheaper_reliable_provider_is_recommended() {
		let providers = vec![provider("B", 0.004, 92.0), provider("A", 0.0015, 95.0)];
		let analysis = optimizer()
			.analyze(ServiceType::Weather, &providers, &request(1.0))
			.unwrap();

		assert_eq!(analysis.recommendation.primary_provider_id, "A");
		assert_eq!(analysis.recommendation.backup_provider_ids, vec!["B"]);
		assert_eq!(analysis.analyses[0].rank, 1);
		assert!((analysis.recommendation.expected_savings - 0.0025).abs() < EPSILON);
	}

	#[test]
	fn test_no_candidates() {
		let mut inactive = provider("A", 0.001, 95.0);
		inactive.deactivate();
		let mut other_type = provider("B", 0.001, 95.0);
		other_type.service_type = ServiceType::Storage;

		for providers in [vec![], vec![inactive, other_type]] {
			assert_eq!(
				optimizer()
					.analyze(ServiceType::Weather, &providers, &request(1.0))
					.unwrap_err(),
				OptimizerError::NoProvidersAvailable {
					service_type: ServiceType::Weather
				}
			);
		}
	}

	#[test]
	fn test_over_budget_providers_rank_by_other_criteria() {
		let providers = vec![provider("A", 5.0, 80.0), provider("B", 9.0, 99.0)];
		let analysis = optimizer()
			.analyze(ServiceType::Weather, &providers, &request(1.0))
			.unwrap();

		assert!(analysis.analyses.iter().all(|a| a.sub_scores.cost == 0.0));
		assert!(analysis
			.analyses
			.iter()
			.all(|a| a.cons.contains(&"exceeds budget".to_string())));
		assert_eq!(analysis.recommendation.primary_provider_id, "B");
	}

	#[test]
	fn test_ties_break_by_provider_id() {
		let providers = vec![provider("zeta", 0.01, 90.0), provider("alpha", 0.01, 90.0)];
		let analysis = optimizer()
			.analyze(ServiceType::Weather, &providers, &request(1.0))
			.unwrap();

		assert_eq!(analysis.recommendation.primary_provider_id, "alpha");
		assert_eq!(analysis.recommendation.confidence, 50.0);
	}

	#[test]
	fn test_single_candidate_confidence_is_capped() {
		let analysis = optimizer()
			.analyze(ServiceType::Weather, &[provider("A", 0.001, 99.0)], &request(1.0))
			.unwrap();
		assert_eq!(analysis.recommendation.confidence, 95.0);
		assert!(analysis.recommendation.backup_provider_ids.is_empty());
		assert_eq!(analysis.recommendation.expected_savings, 0.0);
	}

	#[test]
	fn test_at_most_two_backups() {
		let providers: Vec<Provider> = (0..5)
			.map(|i| provider(&format!("p{}", i), 0.01 * (i + 1) as f64, 90.0))
			.collect();
		let analysis = optimizer()
			.analyze(ServiceType::Weather, &providers, &request(1.0))
			.unwrap();
		assert_eq!(analysis.recommendation.backup_provider_ids, vec!["p1", "p2"]);
		assert_eq!(analysis.analyses.len(), 5);
	}

	#[test]
	fn test_estimate_cost_by_pricing_kind() {
		let optimizer = optimizer();
		let request = request(1.0).with_parameters(json!({"payload_kb": 20.0, "duration_secs": 3.0}));

		let mut p = provider("A", 0.5, 90.0);
		p.pricing = PricingModel::with_kind(PricingKind::PerUnitSize, 0.01);
		assert!((optimizer.estimate_cost(&p, &request) - 0.2).abs() < EPSILON);

		p.pricing = PricingModel::with_kind(PricingKind::PerTime, 0.1);
		assert!((optimizer.estimate_cost(&p, &request) - 0.3).abs() < EPSILON);

		p.pricing = PricingModel::with_kind(PricingKind::Subscription, 50.0);
		assert!((optimizer.estimate_cost(&p, &request) - 0.05).abs() < EPSILON);

		p.pricing = PricingModel::per_request(0.01).with_tiers(vec![PricingTier {
			up_to: 10,
			price: 0.02,
		}]);
		assert!((optimizer.estimate_cost(&p, &request) - 0.02).abs() < EPSILON);
		p.usage.requests_this_period = 11;
		assert!((optimizer.estimate_cost(&p, &request) - 0.01).abs() < EPSILON);
	}

	#[test]
	fn test_default_payload_when_parameter_missing() {
		let mut p = provider("A", 0.5, 90.0);
		p.pricing = PricingModel::with_kind(PricingKind::PerUnitSize, 0.01);
		let cost = optimizer().estimate_cost(&p, &request(1.0));
		assert!((cost - 0.01 * OptimizerSettings::default().default_payload_kb).abs() < EPSILON);
	}

	#[test]
	fn test_free_tier_costs_nothing() {
		let mut p = provider("A", 0.5, 90.0);
		p.pricing = PricingModel::per_request(0.5).with_free_tier(100);
		p.usage.requests_this_period = 99;

		let analysis = optimizer()
			.analyze(ServiceType::Weather, &[p.clone()], &request(1.0))
			.unwrap();
		assert_eq!(analysis.analyses[0].estimated_cost, 0.0);
		assert_eq!(analysis.analyses[0].sub_scores.cost, 100.0);
		assert!(analysis.analyses[0]
			.pros
			.contains(&"free tier available".to_string()));

		p.usage.requests_this_period = 100;
		assert_eq!(optimizer().estimate_cost(&p, &request(1.0)), 0.5);
	}

	#[test]
	fn test_performance_score_curve() {
		assert_eq!(performance_score(50.0), 100.0);
		assert_eq!(performance_score(100.0), 100.0);
		assert_eq!(performance_score(5000.0), 10.0);
		assert_eq!(performance_score(60_000.0), 10.0);
		let mid = performance_score(1000.0);
		assert!(mid > 10.0 && mid < 100.0);
		assert!(performance_score(500.0) > performance_score(1000.0));
	}

	#[test]
	fn test_cost_score() {
		assert_eq!(cost_score(0.0, 1.0), 100.0);
		assert!((cost_score(0.25, 1.0) - 75.0).abs() < EPSILON);
		assert_eq!(cost_score(1.5, 1.0), 0.0);
		assert_eq!(cost_score(0.1, 0.0), 0.0);
	}

	#[test]
	fn test_metrics_source_enriches_providers() {
		let mut source = MockQualityMetricsSource::new();
		source
			.expect_quality_metrics()
			.returning(|provider_id| match provider_id {
				"A" => Some(QualityMetrics::new(50.0, 4000.0, 40.0, 50.0)),
				_ => None,
			});

		let optimizer = optimizer().with_metrics_source(Arc::new(source));
		let providers = vec![provider("A", 0.001, 99.0), provider("B", 0.002, 95.0)];
		let analysis = optimizer
			.analyze(ServiceType::Weather, &providers, &request(1.0))
			.unwrap();

		assert_eq!(analysis.recommendation.primary_provider_id, "B");
		assert_eq!(analysis.analysis_for("A").unwrap().sub_scores.reliability, 40.0);
	}

	#[test]
	fn test_update_weights_renormalizes() {
		let optimizer = optimizer();
		let weights = optimizer
			.update_weights(WeightsUpdate {
				cost: Some(1.0),
				quality: Some(0.0),
				..Default::default()
			})
			.unwrap();

		assert!((weights.sum() - 1.0).abs() < EPSILON);
		assert_eq!(optimizer.weights(), weights);
		assert_eq!(weights.quality, 0.0);
	}

	#[test]
	fn test_update_weights_rejects_invalid_input() {
		let optimizer = optimizer();
		let before = optimizer.weights();

		assert!(optimizer
			.update_weights(WeightsUpdate {
				reliability: Some(-0.5),
				..Default::default()
			})
			.is_err());
		assert!(optimizer
			.update_weights(WeightsUpdate {
				cost: Some(0.0),
				reliability: Some(0.0),
				performance: Some(0.0),
				quality: Some(0.0),
			})
			.is_err());
		assert_eq!(optimizer.weights(), before);
	}

	fn record(provider_id: &str, status: RequestStatus, response_time_ms: u64) -> HistoricalRecord {
		HistoricalRecord {
			request_id: format!("req-{}", provider_id),
			provider_id: provider_id.to_string(),
			status,
			response_time_ms,
			cost: 0.01,
			timestamp: Utc::now() - Duration::minutes(1),
		}
	}

	#[test]
	fn test_predict_optimal_choice() {
		let optimizer = optimizer();
		assert_eq!(optimizer.predict_optimal_choice(&[]), None);

		let history = vec![
			record("b", RequestStatus::Completed, 100),
			record("b", RequestStatus::Completed, 150),
			record("a", RequestStatus::Completed, 100),
			record("a", RequestStatus::Failed, 100),
			record("a", RequestStatus::Completed, 2500),
		];
		assert_eq!(optimizer.predict_optimal_choice(&history).as_deref(), Some("b"));
	}

	#[test]
	fn test_predict_ties_resolve_to_smallest_id() {
		let history = vec![
			record("c", RequestStatus::Completed, 100),
			record("a", RequestStatus::Completed, 100),
			record("b", RequestStatus::Completed, 100),
		];
		assert_eq!(
			optimizer().predict_optimal_choice(&history).as_deref(),
			Some("a")
		);
	}
}
