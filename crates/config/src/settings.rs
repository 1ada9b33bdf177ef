//! Configuration settings structures

use broker_types::{
	OptimizerWeights, PricingModel, Provider, ProviderValidationError, QualityMetrics,
	RetryPolicy, ServiceType,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Main application settings
///
/// Every section has defaults so a partial file (or none) is valid.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
	pub optimizer: OptimizerSettings,
	pub scheduler: SchedulerSettings,
	pub monitor: MonitorSettings,
	pub budget: BudgetSettings,
	pub execution: ExecutionSettings,
	pub logging: LoggingSettings,
	pub providers: HashMap<String, ProviderConfig>,
}

/// Optimizer weights as configured (normalized on load)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WeightSettings {
	pub cost: f64,
	pub reliability: f64,
	pub performance: f64,
	pub quality: f64,
}

impl Default for WeightSettings {
	fn default() -> Self {
		let weights = OptimizerWeights::default();
		Self {
			cost: weights.cost,
			reliability: weights.reliability,
			performance: weights.performance,
			quality: weights.quality,
		}
	}
}

impl From<&WeightSettings> for OptimizerWeights {
	fn from(settings: &WeightSettings) -> Self {
		Self {
			cost: settings.cost,
			reliability: settings.reliability,
			performance: settings.performance,
			quality: settings.quality,
		}
	}
}

/// Cost/quality optimizer configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OptimizerSettings {
	pub weights: WeightSettings,
	/// Payload size assumed for per-unit-size pricing when the request has none
	pub default_payload_kb: f64,
	/// Duration assumed for per-time pricing when the request has none
	pub default_duration_secs: f64,
	/// Monthly volume a subscription price is spread over
	pub subscription_monthly_volume: f64,
	/// Records faster than this count as successes for prediction
	pub success_response_threshold_ms: u64,
}

impl Default for OptimizerSettings {
	fn default() -> Self {
		Self {
			weights: WeightSettings::default(),
			default_payload_kb: 1.0,
			default_duration_secs: 1.0,
			subscription_monthly_volume: 1000.0,
			success_response_threshold_ms: 2000,
		}
	}
}

/// Retry policy applied to payment jobs
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RetrySettings {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub multiplier: f64,
}

impl Default for RetrySettings {
	fn default() -> Self {
		let policy = RetryPolicy::default();
		Self {
			max_attempts: policy.max_attempts,
			base_delay_ms: policy.base_delay_ms,
			multiplier: policy.multiplier,
		}
	}
}

impl From<&RetrySettings> for RetryPolicy {
	fn from(settings: &RetrySettings) -> Self {
		Self {
			max_attempts: settings.max_attempts,
			base_delay_ms: settings.base_delay_ms,
			multiplier: settings.multiplier,
		}
	}
}

/// Payment scheduler configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerSettings {
	pub worker_count: usize,
	/// Maximum number of queued (waiting or delayed) jobs
	pub queue_capacity: usize,
	/// Timeout for each provider call and each settlement
	pub provider_call_timeout_ms: u64,
	pub retry: RetrySettings,
	/// Number of execution records kept for prediction and usage metrics
	pub history_limit: usize,
	/// Terminal jobs kept for inspection before the oldest are evicted
	pub max_retained_jobs: usize,
}

impl Default for SchedulerSettings {
	fn default() -> Self {
		Self {
			worker_count: 4,
			queue_capacity: 10_000,
			provider_call_timeout_ms: 30_000,
			retry: RetrySettings::default(),
			history_limit: 1000,
			max_retained_jobs: 10_000,
		}
	}
}

/// Service quality monitor configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorSettings {
	pub check_interval_ms: u64,
	pub check_timeout_ms: u64,
	/// Health checks kept per provider
	pub max_history: usize,
	/// Performance samples kept per provider
	pub max_samples: usize,
	/// Number of recent checks used for rolling averages and trend
	pub recent_window: usize,
	pub response_time_threshold_ms: u64,
	/// Error rate (percent) above which a degradation alert fires
	pub error_rate_threshold_pct: f64,
	/// Minimum gap between two alerts for the same provider
	pub alert_cooldown_ms: u64,
	pub reputation_window_hours: i64,
}

impl Default for MonitorSettings {
	fn default() -> Self {
		Self {
			check_interval_ms: 60_000,
			check_timeout_ms: 10_000,
			max_history: 1000,
			max_samples: 1440,
			recent_window: 10,
			response_time_threshold_ms: 5000,
			error_rate_threshold_pct: 10.0,
			alert_cooldown_ms: 300_000,
			reputation_window_hours: 24,
		}
	}
}

/// Limits for a specific user
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserBudgetConfig {
	pub daily_limit: f64,
	pub monthly_limit: f64,
	#[serde(default)]
	pub emergency_stop: bool,
}

/// Budget ledger configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BudgetSettings {
	/// Limits applied to users without an explicit entry
	pub default_daily_limit: f64,
	pub default_monthly_limit: f64,
	pub users: HashMap<String, UserBudgetConfig>,
}

impl Default for BudgetSettings {
	fn default() -> Self {
		Self {
			default_daily_limit: 100.0,
			default_monthly_limit: 1000.0,
			users: HashMap::new(),
		}
	}
}

/// Which service executor runs payment jobs
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
	Simulated,
	Http,
}

/// Service execution configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutionSettings {
	pub mode: ExecutionMode,
	/// Fraction of simulated executions that succeed
	pub simulated_success_rate: f64,
	pub simulated_latency_ms: u64,
	/// Settlement endpoint used by the HTTP executor
	pub payment_gateway_url: Option<String>,
}

impl Default for ExecutionSettings {
	fn default() -> Self {
		Self {
			mode: ExecutionMode::Simulated,
			simulated_success_rate: 0.9,
			simulated_latency_ms: 50,
			payment_gateway_url: None,
		}
	}
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingSettings {
	pub level: String,
	pub format: LogFormat,
	pub structured: bool,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::Pretty,
			structured: false,
		}
	}
}

/// Log format options
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	Json,
	Pretty,
	Compact,
}

/// Individual provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
	pub name: String,
	pub service_type: String,
	pub endpoint: String,
	pub pricing: PricingModel,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	/// Initial quality snapshot until the monitor has data
	#[serde(default)]
	pub uptime: Option<f64>,
	#[serde(default)]
	pub avg_response_time_ms: Option<f64>,
	#[serde(default)]
	pub reliability_score: Option<f64>,
	#[serde(default)]
	pub data_accuracy: Option<f64>,
}

fn default_enabled() -> bool {
	true
}

impl ProviderConfig {
	/// Build the domain provider registered under `provider_id`
	pub fn to_provider(&self, provider_id: &str) -> Result<Provider, ProviderValidationError> {
		let service_type: ServiceType = self.service_type.parse()?;
		let quality = QualityMetrics::new(
			self.uptime.unwrap_or(100.0),
			self.avg_response_time_ms.unwrap_or(0.0),
			self.reliability_score.unwrap_or(100.0),
			self.data_accuracy.unwrap_or(100.0),
		);
		let mut provider = Provider::new(
			provider_id,
			self.name.clone(),
			service_type,
			self.endpoint.clone(),
			self.pricing.clone(),
		)
		.with_quality(quality);
		if !self.enabled {
			provider.deactivate();
		}
		provider.validate()?;
		Ok(provider)
	}
}

/// Validation errors for loaded settings
#[derive(Debug, Error)]
pub enum ConfigValidationError {
	#[error("Invalid optimizer weights: {reason}")]
	InvalidWeights { reason: String },

	#[error("Invalid value for {field}: {reason}")]
	InvalidValue { field: String, reason: String },

	#[error("Invalid provider {provider_id}: {source}")]
	InvalidProvider {
		provider_id: String,
		#[source]
		source: ProviderValidationError,
	},
}

fn invalid(field: &str, reason: &str) -> ConfigValidationError {
	ConfigValidationError::InvalidValue {
		field: field.to_string(),
		reason: reason.to_string(),
	}
}

impl Settings {
	/// Providers whose `enabled` flag is set
	pub fn enabled_providers(&self) -> HashMap<String, ProviderConfig> {
		self.providers
			.iter()
			.filter(|(_, config)| config.enabled)
			.map(|(id, config)| (id.clone(), config.clone()))
			.collect()
	}

	/// Normalized optimizer weights
	pub fn optimizer_weights(&self) -> Result<OptimizerWeights, ConfigValidationError> {
		OptimizerWeights::from(&self.optimizer.weights)
			.normalized()
			.ok_or_else(|| ConfigValidationError::InvalidWeights {
				reason: "weights must be finite, non-negative and not all zero".to_string(),
			})
	}

	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::from(&self.scheduler.retry)
	}

	/// Domain providers built from the provider section
	pub fn build_providers(&self) -> Result<Vec<Provider>, ConfigValidationError> {
		let mut providers = self
			.providers
			.iter()
			.map(|(id, config)| {
				config
					.to_provider(id)
					.map_err(|source| ConfigValidationError::InvalidProvider {
						provider_id: id.clone(),
						source,
					})
			})
			.collect::<Result<Vec<_>, _>>()?;
		providers.sort_by(|a, b| a.id.cmp(&b.id));
		Ok(providers)
	}

	/// Validate the loaded configuration
	pub fn validate(&self) -> Result<(), ConfigValidationError> {
		self.optimizer_weights()?;

		let optimizer = &self.optimizer;
		for (field, value) in [
			("optimizer.default_payload_kb", optimizer.default_payload_kb),
			("optimizer.default_duration_secs", optimizer.default_duration_secs),
		] {
			if !value.is_finite() || value < 0.0 {
				return Err(invalid(field, "must be a non-negative number"));
			}
		}
		if !optimizer.subscription_monthly_volume.is_finite()
			|| optimizer.subscription_monthly_volume <= 0.0
		{
			return Err(invalid(
				"optimizer.subscription_monthly_volume",
				"must be positive",
			));
		}

		let scheduler = &self.scheduler;
		if scheduler.worker_count == 0 {
			return Err(invalid("scheduler.worker_count", "must be at least 1"));
		}
		if scheduler.queue_capacity == 0 {
			return Err(invalid("scheduler.queue_capacity", "must be at least 1"));
		}
		if scheduler.provider_call_timeout_ms == 0 {
			return Err(invalid(
				"scheduler.provider_call_timeout_ms",
				"must be positive",
			));
		}
		if scheduler.retry.max_attempts == 0 {
			return Err(invalid("scheduler.retry.max_attempts", "must be at least 1"));
		}
		if !scheduler.retry.multiplier.is_finite() || scheduler.retry.multiplier < 1.0 {
			return Err(invalid("scheduler.retry.multiplier", "must be >= 1.0"));
		}

		let monitor = &self.monitor;
		if monitor.check_interval_ms == 0 || monitor.check_timeout_ms == 0 {
			return Err(invalid(
				"monitor.check_interval_ms",
				"interval and timeout must be positive",
			));
		}
		if monitor.max_history == 0 || monitor.max_samples == 0 || monitor.recent_window == 0 {
			return Err(invalid(
				"monitor.max_history",
				"history, sample and window sizes must be positive",
			));
		}
		if !(0.0..=100.0).contains(&monitor.error_rate_threshold_pct) {
			return Err(invalid(
				"monitor.error_rate_threshold_pct",
				"must be between 0 and 100",
			));
		}
		if monitor.reputation_window_hours <= 0 {
			return Err(invalid("monitor.reputation_window_hours", "must be positive"));
		}

		let budget = &self.budget;
		if budget.default_daily_limit < 0.0 || budget.default_monthly_limit < 0.0 {
			return Err(invalid("budget.default_daily_limit", "limits must be >= 0"));
		}
		if let Some((user, _)) = budget
			.users
			.iter()
			.find(|(_, limits)| limits.daily_limit < 0.0 || limits.monthly_limit < 0.0)
		{
			return Err(invalid(&format!("budget.users.{}", user), "limits must be >= 0"));
		}

		let rate = self.execution.simulated_success_rate;
		if !(0.0..=1.0).contains(&rate) {
			return Err(invalid(
				"execution.simulated_success_rate",
				"must be between 0 and 1",
			));
		}
		if self.execution.mode == ExecutionMode::Http && self.execution.payment_gateway_url.is_none()
		{
			return Err(invalid(
				"execution.payment_gateway_url",
				"required when execution mode is http",
			));
		}

		self.build_providers()?;
		Ok(())
	}
}
