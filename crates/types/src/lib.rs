//! Broker Types
//!
//! Shared models and traits for the provider broker.
//! This crate contains all domain models organized by business entity.

pub mod adapters;
pub mod analysis;
pub mod monitoring;
pub mod payments;
pub mod providers;
pub mod requests;
pub mod storage;

// Re-export chrono and serde_json for convenience
pub use chrono;
pub use serde_json;

pub use adapters::{AdapterError, AdapterResult, HealthProbe, ServiceExecutor};

pub use analysis::{
	CostAnalysis, HistoricalRecord, OptimizerWeights, ProviderAnalysis, Recommendation, SubScores,
	UsageMetrics, WeightsUpdate,
};

pub use monitoring::{
	Alert, AlertSeverity, AlertType, HealthCheck, MonitorHealth, PerformanceSample, ProviderStats,
	ReputationFactors, ReputationScore, SampleSource, Trend,
};

pub use payments::{
	BudgetCheck, JobState, PaymentJob, PaymentReceipt, QueueStats, RetryPolicy, ScheduleOptions,
	SchedulerHealth, ServiceResponse,
};

pub use providers::{
	FreeTier, PricingKind, PricingModel, PricingTier, Provider, ProviderUsage,
	ProviderValidationError, ProviderValidationResult, QualityMetrics, ServiceType,
};

pub use requests::{Priority, RequestStatus, ServiceRequest};

pub use storage::{
	BudgetService, ProviderCatalog, RequestStore, StorageError, StorageResult,
};
