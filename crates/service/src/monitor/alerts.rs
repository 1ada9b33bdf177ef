//! Alert detection and storage

use broker_config::MonitorSettings;
use broker_types::{Alert, AlertSeverity, AlertType, HealthCheck};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Condition found by [`detect`] before cooldown is applied
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCondition {
	pub alert_type: AlertType,
	pub severity: AlertSeverity,
	pub message: String,
	pub details: Value,
}

/// Evaluate the alert rules for `check`
///
/// `recent` holds the last checks of the provider, `check` included. The
/// first matching rule wins: unreachable provider, slow responses, then the
/// rolling error rate.
pub fn detect(
	check: &HealthCheck,
	recent: &[HealthCheck],
	settings: &MonitorSettings,
) -> Option<AlertCondition> {
	if check.is_unreachable() {
		return Some(AlertCondition {
			alert_type: AlertType::ServiceDown,
			severity: AlertSeverity::High,
			message: format!("Provider {} is down", check.provider_id),
			details: json!({
				"error": check.error_message,
				"response_time_ms": check.response_time_ms,
			}),
		});
	}

	if recent.is_empty() {
		return None;
	}

	let threshold = settings.response_time_threshold_ms;
	let avg_response_time = recent
		.iter()
		.map(|c| c.response_time_ms as f64)
		.sum::<f64>()
		/ recent.len() as f64;
	if check.response_time_ms > threshold && avg_response_time > threshold as f64 {
		return Some(AlertCondition {
			alert_type: AlertType::PerformanceDegradation,
			severity: AlertSeverity::Medium,
			message: format!(
				"Provider {} responds slowly: {:.0}ms average over the last {} checks",
				check.provider_id,
				avg_response_time,
				recent.len()
			),
			details: json!({
				"response_time_ms": check.response_time_ms,
				"avg_response_time_ms": avg_response_time,
				"threshold_ms": threshold,
			}),
		});
	}

	let failures = recent.iter().filter(|c| !c.is_healthy).count();
	let error_rate = failures as f64 / recent.len() as f64 * 100.0;
	if error_rate > settings.error_rate_threshold_pct {
		return Some(AlertCondition {
			alert_type: AlertType::PerformanceDegradation,
			severity: AlertSeverity::Medium,
			message: format!(
				"Provider {} error rate is {:.1}% over the last {} checks",
				check.provider_id,
				error_rate,
				recent.len()
			),
			details: json!({
				"error_rate_pct": error_rate,
				"threshold_pct": settings.error_rate_threshold_pct,
				"failed_checks": failures,
				"window": recent.len(),
			}),
		});
	}

	None
}

/// Raised alerts plus the per-provider cooldown
///
/// A provider gets at most one alert per cooldown period, whatever its kind.
#[derive(Debug)]
pub struct AlertManager {
	alerts: DashMap<String, Alert>,
	last_alert: DashMap<String, Instant>,
	cooldown: Duration,
}

impl AlertManager {
	pub fn new(cooldown: Duration) -> Self {
		Self {
			alerts: DashMap::new(),
			last_alert: DashMap::new(),
			cooldown,
		}
	}

	/// Run the rules for `check` and store the resulting alert, if any
	pub fn evaluate(
		&self,
		check: &HealthCheck,
		recent: &[HealthCheck],
		settings: &MonitorSettings,
	) -> Option<Alert> {
		let condition = detect(check, recent, settings)?;

		let now = Instant::now();
		match self.last_alert.entry(check.provider_id.clone()) {
			Entry::Occupied(mut last) => {
				if now.duration_since(*last.get()) < self.cooldown {
					debug!(
						"Suppressing {:?} alert for provider {} during cooldown",
						condition.alert_type, check.provider_id
					);
					return None;
				}
				last.insert(now);
			},
			Entry::Vacant(slot) => {
				slot.insert(now);
			},
		}

		let alert = Alert::new(
			condition.alert_type,
			condition.severity,
			condition.message,
			condition.details,
			Some(check.provider_id.clone()),
		);
		warn!(
			alert_id = %alert.id,
			provider_id = %check.provider_id,
			severity = ?alert.severity,
			"{}",
			alert.message
		);
		self.alerts.insert(alert.id.clone(), alert.clone());
		Some(alert)
	}

	/// Alerts ordered by creation time, optionally of one severity
	pub fn list(&self, severity: Option<AlertSeverity>) -> Vec<Alert> {
		let mut alerts: Vec<Alert> = self
			.alerts
			.iter()
			.filter(|entry| severity.map_or(true, |s| entry.severity == s))
			.map(|entry| entry.value().clone())
			.collect();
		alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
		alerts
	}

	/// Mark an alert resolved; None if unknown
	pub fn resolve(&self, alert_id: &str) -> Option<Alert> {
		let mut alert = self.alerts.get_mut(alert_id)?;
		alert.resolve();
		Some(alert.clone())
	}

	/// Unresolved alerts, optionally for a single provider
	pub fn open_count(&self, provider_id: Option<&str>) -> usize {
		self.alerts
			.iter()
			.filter(|entry| !entry.is_resolved)
			.filter(|entry| {
				provider_id.map_or(true, |id| entry.provider_id.as_deref() == Some(id))
			})
			.count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn settings() -> MonitorSettings {
		MonitorSettings {
			recent_window: 20,
			response_time_threshold_ms: 1000,
			error_rate_threshold_pct: 10.0,
			..MonitorSettings::default()
		}
	}

	#[test]
	fn test_unreachable_raises_service_down() {
		let check = HealthCheck::failed("p", 10_000, "connection refused");
		let condition = detect(&check, &[check.clone()], &settings()).unwrap();
		assert_eq!(condition.alert_type, AlertType::ServiceDown);
		assert_eq!(condition.severity, AlertSeverity::High);
	}

	#[test]
	fn test_error_status_is_not_service_down() {
		let check = HealthCheck::unhealthy("p", 80, 503, "unavailable");
		let condition = detect(&check, &[check.clone()], &settings()).unwrap();
		assert_eq!(condition.alert_type, AlertType::PerformanceDegradation);
		assert_eq!(condition.severity, AlertSeverity::Medium);
	}

	#[test]
	fn test_slow_check_needs_slow_average() {
		let fast = HealthCheck::healthy("p", 100, 200);
		let slow = HealthCheck::healthy("p", 3000, 200);

		// 3000 + 100 * 4 averages 680ms
		let mut recent = vec![fast.clone(); 4];
		recent.push(slow.clone());
		assert!(detect(&slow, &recent, &settings()).is_none());

		let recent = vec![slow.clone(); 3];
		let condition = detect(&slow, &recent, &settings()).unwrap();
		assert_eq!(condition.alert_type, AlertType::PerformanceDegradation);

		// slow average alone does not fire on a fast check
		let mut recent = vec![slow; 5];
		recent.push(fast.clone());
		assert!(detect(&fast, &recent, &settings()).is_none());
	}

	#[test]
	fn test_error_rate_rule() {
		let healthy = HealthCheck::healthy("p", 80, 200);
		let mut recent = vec![healthy.clone(); 10];
		recent.push(HealthCheck::unhealthy("p", 80, 500, "boom"));
		// 1 of 11 is 9.1%
		assert!(detect(&healthy, &recent, &settings()).is_none());

		recent.push(HealthCheck::unhealthy("p", 80, 500, "boom"));
		assert!(detect(&healthy, &recent, &settings()).is_some());
	}

	#[test]
	fn test_cooldown_is_shared_across_kinds() {
		let manager = AlertManager::new(Duration::from_secs(60));
		let settings = settings();

		let degraded = HealthCheck::unhealthy("p", 80, 503, "unavailable");
		let first = manager.evaluate(&degraded, &[degraded.clone()], &settings);
		assert_eq!(first.unwrap().alert_type, AlertType::PerformanceDegradation);

		let down = HealthCheck::failed("p", 10_000, "timeout");
		assert!(manager.evaluate(&down, &[down.clone()], &settings).is_none());

		// other providers are unaffected
		let other = HealthCheck::failed("q", 10_000, "timeout");
		assert!(manager.evaluate(&other, &[other.clone()], &settings).is_some());
		assert_eq!(manager.list(None).len(), 2);
	}

	#[test]
	fn test_cooldown_expires() {
		let manager = AlertManager::new(Duration::ZERO);
		let down = HealthCheck::failed("p", 10_000, "timeout");
		assert!(manager.evaluate(&down, &[down.clone()], &settings()).is_some());
		assert!(manager.evaluate(&down, &[down.clone()], &settings()).is_some());
	}

	#[test]
	fn test_list_and_resolve() {
		let manager = AlertManager::new(Duration::ZERO);
		let down = HealthCheck::failed("p", 10_000, "timeout");
		let alert = manager
			.evaluate(&down, &[down.clone()], &settings())
			.unwrap();
		let degraded = HealthCheck::unhealthy("q", 80, 503, "unavailable");
		manager.evaluate(&degraded, &[degraded.clone()], &settings());

		assert_eq!(manager.list(Some(AlertSeverity::High)).len(), 1);
		assert_eq!(manager.list(Some(AlertSeverity::Medium)).len(), 1);
		assert_eq!(manager.open_count(Some("p")), 1);

		let resolved = manager.resolve(&alert.id).unwrap();
		assert!(resolved.is_resolved);
		assert_eq!(manager.open_count(Some("p")), 0);
		assert_eq!(manager.open_count(None), 1);
		assert!(manager.resolve("missing").is_none());
	}
}
