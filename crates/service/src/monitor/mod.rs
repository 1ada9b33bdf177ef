//! Provider quality monitoring
//!
//! Runs a periodic health check per registered provider, keeps bounded
//! check and performance history, derives reputation scores and raises
//! alerts when a provider goes down or degrades.

pub mod alerts;
pub mod registry;
pub mod reputation;
pub mod tasks;

pub use alerts::AlertManager;
pub use registry::ProviderRegistry;
pub use tasks::HealthCheckTask;

use broker_adapters::ProbeRegistry;
use broker_config::MonitorSettings;
use broker_types::{
	Alert, AlertSeverity, HealthCheck, MonitorHealth, PerformanceSample, Provider, ProviderStats,
	QualityMetrics, ReputationScore, SampleSource,
};
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::optimizer::QualityMetricsSource;
use crate::scheduler::ExecutionObserver;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorError {
	#[error("Provider not found: {provider_id}")]
	ProviderNotFound { provider_id: String },

	#[error("Alert not found: {alert_id}")]
	AlertNotFound { alert_id: String },
}

/// Bounded history of one provider
#[derive(Debug, Default)]
struct ProviderHistory {
	checks: VecDeque<HealthCheck>,
	samples: VecDeque<PerformanceSample>,
}

impl ProviderHistory {
	fn push_check(&mut self, check: HealthCheck, limit: usize) {
		self.checks.push_back(check);
		while self.checks.len() > limit {
			self.checks.pop_front();
		}
	}

	fn push_sample(&mut self, sample: PerformanceSample, limit: usize) {
		self.samples.push_back(sample);
		while self.samples.len() > limit {
			self.samples.pop_front();
		}
	}

	fn recent_checks(&self, window: usize) -> Vec<HealthCheck> {
		let skip = self.checks.len().saturating_sub(window);
		self.checks.iter().skip(skip).cloned().collect()
	}
}

struct MonitorInner {
	settings: MonitorSettings,
	probes: ProbeRegistry,
	registry: ProviderRegistry,
	history: DashMap<String, ProviderHistory>,
	alerts: AlertManager,
	tasks: DashMap<String, HealthCheckTask>,
	shutting_down: AtomicBool,
}

impl MonitorInner {
	async fn perform_health_check(&self, provider_id: &str) -> Result<HealthCheck, MonitorError> {
		let provider =
			self.registry
				.get(provider_id)
				.ok_or_else(|| MonitorError::ProviderNotFound {
					provider_id: provider_id.to_string(),
				})?;

		let probe = self.probes.probe_for(provider.service_type);
		let limit = Duration::from_millis(self.settings.check_timeout_ms);
		let started = Instant::now();

		let check = match tokio::time::timeout(limit, probe.check(&provider)).await {
			Ok(check) => check,
			Err(_) => HealthCheck::failed(
				provider_id,
				started.elapsed().as_millis() as u64,
				format!(
					"health check timed out after {}ms",
					self.settings.check_timeout_ms
				),
			),
		};

		debug!(
			"Health check for {}: healthy={} {}ms",
			provider_id, check.is_healthy, check.response_time_ms
		);
		self.record_health_check(check.clone());
		Ok(check)
	}

	fn record_health_check(&self, check: HealthCheck) -> Option<Alert> {
		let sample = PerformanceSample {
			timestamp: check.timestamp,
			response_time_ms: check.response_time_ms,
			success: check.is_healthy,
			source: SampleSource::HealthCheck,
		};

		let recent = {
			let mut history = self.history.entry(check.provider_id.clone()).or_default();
			history.push_check(check.clone(), self.settings.max_history);
			history.push_sample(sample, self.settings.max_samples);
			history.recent_checks(self.settings.recent_window)
		};

		self.refresh_metrics(&check.provider_id);
		self.alerts.evaluate(&check, &recent, &self.settings)
	}

	fn record_sample(&self, provider_id: &str, sample: PerformanceSample) {
		self.history
			.entry(provider_id.to_string())
			.or_default()
			.push_sample(sample, self.settings.max_samples);
		self.refresh_metrics(provider_id);
	}

	fn refresh_metrics(&self, provider_id: &str) {
		if let Some(metrics) = self.metrics_from_history(provider_id) {
			self.registry.update_quality(provider_id, metrics);
		}
	}

	fn calculate_reputation_score(&self, provider_id: &str) -> ReputationScore {
		let cutoff = Utc::now() - ChronoDuration::hours(self.settings.reputation_window_hours);

		let (checks, samples, recent) = match self.history.get(provider_id) {
			Some(history) => (
				history
					.checks
					.iter()
					.filter(|c| c.timestamp >= cutoff)
					.cloned()
					.collect::<Vec<_>>(),
				history
					.samples
					.iter()
					.filter(|s| s.timestamp >= cutoff)
					.cloned()
					.collect::<Vec<_>>(),
				history.recent_checks(self.settings.recent_window),
			),
			None => return ReputationScore::empty(provider_id),
		};

		let provider = self.registry.get(provider_id);
		reputation::calculate(provider_id, &checks, &samples, &recent, provider.as_ref())
	}

	/// Quality projected from the reputation; None without data in the window
	fn metrics_from_history(&self, provider_id: &str) -> Option<QualityMetrics> {
		let score = self.calculate_reputation_score(provider_id);
		let last_updated = score.last_updated?;
		Some(QualityMetrics {
			uptime: score.factors.uptime,
			avg_response_time_ms: score.factors.avg_response_time,
			reliability_score: score.score,
			data_accuracy: score.factors.data_accuracy,
			last_updated,
		})
	}
}

/// Health checking, reputation and alerting for registered providers
///
/// Cloning yields another handle on the same monitor.
#[derive(Clone)]
pub struct ServiceQualityMonitor {
	inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for ServiceQualityMonitor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServiceQualityMonitor")
			.field("providers", &self.inner.registry.len())
			.field("tasks", &self.inner.tasks.len())
			.finish()
	}
}

impl ServiceQualityMonitor {
	pub fn new(settings: MonitorSettings, probes: ProbeRegistry) -> Self {
		let cooldown = Duration::from_millis(settings.alert_cooldown_ms);
		Self {
			inner: Arc::new(MonitorInner {
				settings,
				probes,
				registry: ProviderRegistry::new(),
				history: DashMap::new(),
				alerts: AlertManager::new(cooldown),
				tasks: DashMap::new(),
				shutting_down: AtomicBool::new(false),
			}),
		}
	}

	pub fn settings(&self) -> &MonitorSettings {
		&self.inner.settings
	}

	/// Start monitoring a provider
	///
	/// Re-registering replaces the stored record and restarts its task. Must
	/// be called inside a tokio runtime.
	pub fn register_provider(&self, provider: Provider) {
		let provider_id = provider.id.clone();
		if self.inner.registry.insert(provider).is_some() {
			debug!("Replacing monitored provider {}", provider_id);
		}

		if self.inner.shutting_down.load(Ordering::SeqCst) {
			warn!(
				"Monitor is shutting down, not scheduling checks for {}",
				provider_id
			);
			return;
		}

		let period = Duration::from_millis(self.inner.settings.check_interval_ms);
		let weak = Arc::downgrade(&self.inner);
		let task_provider = provider_id.clone();
		let task = HealthCheckTask::spawn(provider_id.clone(), period, move || {
			let weak = weak.clone();
			let provider_id = task_provider.clone();
			async move {
				if let Some(inner) = weak.upgrade() {
					if let Err(e) = inner.perform_health_check(&provider_id).await {
						warn!("Scheduled health check failed: {}", e);
					}
				}
			}
		});

		if let Some(previous) = self.inner.tasks.insert(provider_id.clone(), task) {
			previous.cancel();
		}
		info!(
			"Monitoring provider {} every {}ms",
			provider_id, self.inner.settings.check_interval_ms
		);
	}

	/// Stop the health checks of a provider; its record and history stay
	pub fn unregister_provider(&self, provider_id: &str) -> Result<(), MonitorError> {
		if !self.inner.registry.contains(provider_id) {
			return Err(MonitorError::ProviderNotFound {
				provider_id: provider_id.to_string(),
			});
		}
		if let Some((_, task)) = self.inner.tasks.remove(provider_id) {
			task.cancel();
			info!("Stopped monitoring provider {}", provider_id);
		}
		Ok(())
	}

	pub fn get_provider(&self, provider_id: &str) -> Option<Provider> {
		self.inner.registry.get(provider_id)
	}

	pub fn providers(&self) -> Vec<Provider> {
		self.inner.registry.all()
	}

	pub fn is_monitored(&self, provider_id: &str) -> bool {
		self.inner
			.tasks
			.get(provider_id)
			.map(|task| task.is_running())
			.unwrap_or(false)
	}

	/// Probe a provider now and record the result
	///
	/// Probe errors and timeouts are recorded as failed checks; only an
	/// unknown provider is an error.
	pub async fn perform_health_check(
		&self,
		provider_id: &str,
	) -> Result<HealthCheck, MonitorError> {
		self.inner.perform_health_check(provider_id).await
	}

	/// Record an externally obtained check and evaluate alerts
	pub fn record_health_check(&self, check: HealthCheck) -> Option<Alert> {
		self.inner.record_health_check(check)
	}

	/// Checks of a provider, oldest first
	pub fn health_history(&self, provider_id: &str) -> Vec<HealthCheck> {
		self.inner
			.history
			.get(provider_id)
			.map(|history| history.checks.iter().cloned().collect())
			.unwrap_or_default()
	}

	pub fn calculate_reputation_score(&self, provider_id: &str) -> ReputationScore {
		self.inner.calculate_reputation_score(provider_id)
	}

	/// Current quality of a provider
	///
	/// Derived from the monitored history; falls back to the registered
	/// snapshot when the window holds no data. Does not mutate any state.
	pub fn get_quality_metrics(&self, provider_id: &str) -> Result<QualityMetrics, MonitorError> {
		if let Some(metrics) = self.inner.metrics_from_history(provider_id) {
			return Ok(metrics);
		}
		self.inner
			.registry
			.get(provider_id)
			.map(|provider| provider.quality_metrics)
			.ok_or_else(|| MonitorError::ProviderNotFound {
				provider_id: provider_id.to_string(),
			})
	}

	pub fn get_alerts(&self, severity: Option<AlertSeverity>) -> Vec<Alert> {
		self.inner.alerts.list(severity)
	}

	pub fn resolve_alert(&self, alert_id: &str) -> Result<Alert, MonitorError> {
		let alert =
			self.inner
				.alerts
				.resolve(alert_id)
				.ok_or_else(|| MonitorError::AlertNotFound {
					alert_id: alert_id.to_string(),
				})?;
		info!("Resolved alert {}", alert_id);
		Ok(alert)
	}

	pub fn get_provider_stats(&self, provider_id: &str) -> Result<ProviderStats, MonitorError> {
		let known = self.inner.registry.contains(provider_id);
		let (total_checks, healthy_checks, performance_samples, last_check) =
			match self.inner.history.get(provider_id) {
				Some(history) => (
					history.checks.len(),
					history.checks.iter().filter(|c| c.is_healthy).count(),
					history.samples.len(),
					history.checks.back().cloned(),
				),
				None if known => (0, 0, 0, None),
				None => {
					return Err(MonitorError::ProviderNotFound {
						provider_id: provider_id.to_string(),
					})
				},
			};

		Ok(ProviderStats {
			provider_id: provider_id.to_string(),
			is_monitored: self.is_monitored(provider_id),
			total_checks,
			healthy_checks,
			performance_samples,
			last_check,
			reputation: self.calculate_reputation_score(provider_id),
			open_alerts: self.inner.alerts.open_count(Some(provider_id)),
		})
	}

	pub fn health_check(&self) -> MonitorHealth {
		let shutting_down = self.inner.shutting_down.load(Ordering::SeqCst);
		let running_tasks = self
			.inner
			.tasks
			.iter()
			.filter(|task| task.is_running())
			.count();

		let mut unhealthy_providers: Vec<String> = self
			.inner
			.history
			.iter()
			.filter(|entry| entry.checks.back().is_some_and(|c| !c.is_healthy))
			.map(|entry| entry.key().clone())
			.collect();
		unhealthy_providers.sort();

		MonitorHealth {
			healthy: !shutting_down && running_tasks == self.inner.tasks.len(),
			registered_providers: self.inner.registry.len(),
			running_tasks,
			unhealthy_providers,
			open_alerts: self.inner.alerts.open_count(None),
		}
	}

	/// Cancel every health-check task; later registrations are not scheduled
	pub fn shutdown(&self) {
		if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
			return;
		}
		info!("Shutting down quality monitor");
		let ids: Vec<String> = self
			.inner
			.tasks
			.iter()
			.map(|entry| entry.key().clone())
			.collect();
		for id in ids {
			if let Some((_, task)) = self.inner.tasks.remove(&id) {
				task.cancel();
			}
		}
	}
}

impl QualityMetricsSource for ServiceQualityMonitor {
	fn quality_metrics(&self, provider_id: &str) -> Option<QualityMetrics> {
		self.inner.metrics_from_history(provider_id)
	}
}

impl ExecutionObserver for ServiceQualityMonitor {
	fn record_execution(&self, provider_id: &str, response_time_ms: u64, success: bool) {
		self.inner.record_sample(
			provider_id,
			PerformanceSample {
				timestamp: Utc::now(),
				response_time_ms,
				success,
				source: SampleSource::Execution,
			},
		);
	}
}
