//! Reputation scoring and trend detection

use broker_types::{
	HealthCheck, PerformanceSample, Provider, ReputationFactors, ReputationScore, Trend,
};

const UPTIME_WEIGHT: f64 = 0.30;
const RESPONSE_WEIGHT: f64 = 0.25;
const ERROR_WEIGHT: f64 = 0.20;
const ACCURACY_WEIGHT: f64 = 0.15;
const COST_WEIGHT: f64 = 0.10;

/// Fewer recent checks than this always yields a stable trend
const MIN_TREND_CHECKS: usize = 10;
const TREND_THRESHOLD: f64 = 0.10;

/// Step score of an average response time
pub fn response_time_step(avg_response_time_ms: f64) -> f64 {
	match avg_response_time_ms {
		t if t <= 100.0 => 100.0,
		t if t <= 500.0 => 90.0,
		t if t <= 1000.0 => 70.0,
		t if t <= 2000.0 => 50.0,
		t if t <= 5000.0 => 30.0,
		_ => 10.0,
	}
}

/// Step score of a unit price
pub fn cost_step(unit_price: f64) -> f64 {
	match unit_price {
		p if p <= 0.001 => 100.0,
		p if p <= 0.005 => 90.0,
		p if p <= 0.01 => 70.0,
		p if p <= 0.05 => 50.0,
		p if p <= 0.1 => 30.0,
		_ => 10.0,
	}
}

fn ratio(matching: usize, total: usize) -> f64 {
	if total == 0 {
		0.0
	} else {
		matching as f64 / total as f64
	}
}

fn healthy_ratio(checks: &[HealthCheck]) -> f64 {
	ratio(checks.iter().filter(|check| check.is_healthy).count(), checks.len())
}

fn mean(values: impl Iterator<Item = u64>) -> f64 {
	let (sum, count) = values.fold((0u64, 0usize), |(sum, count), value| {
		(sum.saturating_add(value), count + 1)
	});
	if count == 0 {
		0.0
	} else {
		sum as f64 / count as f64
	}
}

/// Direction of health over the recent checks
///
/// The checks are split in two halves; a change of the healthy ratio beyond
/// ±0.10 counts as improving or declining.
pub fn trend(recent_checks: &[HealthCheck]) -> Trend {
	if recent_checks.len() < MIN_TREND_CHECKS {
		return Trend::Stable;
	}
	let (first, second) = recent_checks.split_at(recent_checks.len() / 2);
	let delta = healthy_ratio(second) - healthy_ratio(first);
	if delta > TREND_THRESHOLD {
		Trend::Improving
	} else if delta < -TREND_THRESHOLD {
		Trend::Declining
	} else {
		Trend::Stable
	}
}

/// Reputation of a provider over the checks and samples of one window
///
/// Uptime prefers health checks, latency and error rate prefer performance
/// samples; each falls back to the other source when its own is empty.
/// Accuracy and price come from the provider record and count as zero for
/// unknown providers.
pub fn calculate(
	provider_id: &str,
	checks: &[HealthCheck],
	samples: &[PerformanceSample],
	recent_checks: &[HealthCheck],
	provider: Option<&Provider>,
) -> ReputationScore {
	if checks.is_empty() && samples.is_empty() {
		return ReputationScore::empty(provider_id);
	}

	let uptime = if checks.is_empty() {
		ratio(samples.iter().filter(|s| s.success).count(), samples.len()) * 100.0
	} else {
		healthy_ratio(checks) * 100.0
	};

	let (avg_response_time, error_rate) = if samples.is_empty() {
		(
			mean(checks.iter().map(|c| c.response_time_ms)),
			(1.0 - healthy_ratio(checks)) * 100.0,
		)
	} else {
		(
			mean(samples.iter().map(|s| s.response_time_ms)),
			ratio(samples.iter().filter(|s| !s.success).count(), samples.len()) * 100.0,
		)
	};

	let data_accuracy = provider
		.map(|p| p.quality_metrics.data_accuracy)
		.filter(|accuracy| accuracy.is_finite())
		.map_or(0.0, |accuracy| accuracy.clamp(0.0, 100.0));
	let cost_effectiveness = provider.map_or(0.0, |p| cost_step(p.current_unit_price()));

	let score = uptime * UPTIME_WEIGHT
		+ response_time_step(avg_response_time) * RESPONSE_WEIGHT
		+ (100.0 - error_rate) * ERROR_WEIGHT
		+ data_accuracy * ACCURACY_WEIGHT
		+ cost_effectiveness * COST_WEIGHT;

	let last_updated = checks
		.iter()
		.map(|c| c.timestamp)
		.chain(samples.iter().map(|s| s.timestamp))
		.max();

	ReputationScore {
		provider_id: provider_id.to_string(),
		score: score.clamp(0.0, 100.0),
		factors: ReputationFactors {
			uptime,
			avg_response_time,
			error_rate,
			data_accuracy,
			cost_effectiveness,
		},
		trend: trend(recent_checks),
		sample_count: checks.len(),
		last_updated,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use broker_types::{PricingModel, QualityMetrics, SampleSource, ServiceType};
	use chrono::Utc;

	fn checks(pattern: &[bool]) -> Vec<HealthCheck> {
		pattern
			.iter()
			.map(|healthy| {
				if *healthy {
					HealthCheck::healthy("p", 80, 200)
				} else {
					HealthCheck::unhealthy("p", 80, 503, "unavailable")
				}
			})
			.collect()
	}

	fn provider() -> Provider {
		Provider::new(
			"p",
			"P",
			ServiceType::Weather,
			"http://p.local",
			PricingModel::per_request(0.003),
		)
		.with_quality(QualityMetrics::new(100.0, 80.0, 100.0, 90.0))
	}

	#[test]
	fn test_steps() {
		assert_eq!(response_time_step(0.0), 100.0);
		assert_eq!(response_time_step(450.0), 90.0);
		assert_eq!(response_time_step(2000.0), 50.0);
		assert_eq!(response_time_step(9000.0), 10.0);
		assert_eq!(cost_step(0.001), 100.0);
		assert_eq!(cost_step(0.02), 50.0);
		assert_eq!(cost_step(1.0), 10.0);
	}

	#[test]
	fn test_empty_history_scores_zero() {
		let score = calculate("p", &[], &[], &[], Some(&provider()));
		assert_eq!(score.score, 0.0);
		assert_eq!(score.trend, Trend::Stable);
		assert_eq!(score.sample_count, 0);
		assert!(score.last_updated.is_none());
	}

	#[test]
	fn test_perfect_provider() {
		let history = checks(&[true; 12]);
		let score = calculate("p", &history, &[], &history, Some(&provider()));

		// 100*.3 + 100*.25 + 100*.2 + 90*.15 + 90*.1
		assert!((score.score - 97.5).abs() < 1e-9);
		assert_eq!(score.factors.error_rate, 0.0);
		assert_eq!(score.sample_count, 12);
		assert!(score.last_updated.is_some());
	}

	#[test]
	fn test_score_stays_in_range() {
		let history = checks(&[false; 5]);
		let samples = vec![PerformanceSample {
			timestamp: Utc::now(),
			response_time_ms: u64::MAX,
			success: false,
			source: SampleSource::Execution,
		}];
		let score = calculate("unknown", &history, &samples, &history, None);
		assert!((0.0..=100.0).contains(&score.score));
		assert_eq!(score.factors.data_accuracy, 0.0);
		assert_eq!(score.factors.cost_effectiveness, 0.0);
	}

	#[test]
	fn test_samples_drive_latency_and_errors() {
		let history = checks(&[true, true]);
		let samples = vec![
			PerformanceSample {
				timestamp: Utc::now(),
				response_time_ms: 100,
				success: true,
				source: SampleSource::HealthCheck,
			},
			PerformanceSample {
				timestamp: Utc::now(),
				response_time_ms: 300,
				success: false,
				source: SampleSource::Execution,
			},
		];
		let score = calculate("p", &history, &samples, &history, Some(&provider()));
		assert_eq!(score.factors.uptime, 100.0);
		assert_eq!(score.factors.avg_response_time, 200.0);
		assert_eq!(score.factors.error_rate, 50.0);
	}

	#[test]
	fn test_trend() {
		assert_eq!(trend(&checks(&[false; 9])), Trend::Stable);

		// 0.5 healthy in the first half, 0.9 in the second
		let mut pattern = vec![true, false, true, false, true, false, true, false, true, false];
		pattern.extend([true, true, true, true, true, true, true, true, true, false]);
		assert_eq!(trend(&checks(&pattern)), Trend::Improving);

		pattern.reverse();
		assert_eq!(trend(&checks(&pattern)), Trend::Declining);

		assert_eq!(trend(&checks(&[true; 10])), Trend::Stable);
	}
}
