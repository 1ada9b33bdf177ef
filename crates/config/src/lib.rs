//! Broker Configuration
//!
//! Configuration management and startup utilities for the provider broker.

pub mod loader;
pub mod settings;
pub mod startup_logger;

pub use loader::{load_config, load_config_from};
pub use settings::{
	BudgetSettings, ConfigValidationError, ExecutionMode, ExecutionSettings, LogFormat,
	LoggingSettings, MonitorSettings, OptimizerSettings, ProviderConfig, RetrySettings,
	SchedulerSettings, Settings, UserBudgetConfig, WeightSettings,
};
pub use startup_logger::{log_service_info, log_service_shutdown, log_startup_complete};
