//! Configuration mocks and builders for tests

use provider_broker::config::{
	BudgetSettings, LogFormat, LoggingSettings, MonitorSettings, ProviderConfig, RetrySettings,
	SchedulerSettings, Settings, UserBudgetConfig,
};
use provider_broker::PricingModel;
use std::collections::HashMap;

/// Configuration builders for tests
#[allow(dead_code)]
pub struct MockConfigs;

#[allow(dead_code)]
impl MockConfigs {
	/// Minimal settings with fast retries and no periodic health checks
	pub fn test_settings() -> Settings {
		Settings {
			scheduler: SchedulerSettings {
				worker_count: 2,
				queue_capacity: 100,
				provider_call_timeout_ms: 1000,
				retry: RetrySettings {
					max_attempts: 3,
					base_delay_ms: 10,
					multiplier: 2.0,
				},
				..SchedulerSettings::default()
			},
			monitor: MonitorSettings {
				// Long enough that tests drive checks explicitly
				check_interval_ms: 3_600_000,
				check_timeout_ms: 200,
				alert_cooldown_ms: 60_000,
				..MonitorSettings::default()
			},
			budget: BudgetSettings {
				default_daily_limit: 10.0,
				default_monthly_limit: 100.0,
				users: HashMap::new(),
			},
			logging: LoggingSettings {
				level: "debug".to_string(),
				format: LogFormat::Compact,
				structured: false,
			},
			..Settings::default()
		}
	}

	/// Settings with a per-user budget override
	pub fn with_user_budget(user_id: &str, daily_limit: f64, emergency_stop: bool) -> Settings {
		let mut settings = Self::test_settings();
		settings.budget.users.insert(
			user_id.to_string(),
			UserBudgetConfig {
				daily_limit,
				monthly_limit: 100.0,
				emergency_stop,
			},
		);
		settings
	}

	/// Configured weather provider
	pub fn weather_provider_config(price: f64, enabled: bool) -> ProviderConfig {
		ProviderConfig {
			name: "Configured Weather".to_string(),
			service_type: "weather".to_string(),
			endpoint: "http://weather.local".to_string(),
			pricing: PricingModel::per_request(price),
			enabled,
			uptime: Some(99.5),
			avg_response_time_ms: Some(150.0),
			reliability_score: Some(97.0),
			data_accuracy: Some(96.0),
		}
	}
}
