//! Broker Service
//!
//! Core logic of the provider broker: cost/quality provider ranking,
//! budget-aware payment scheduling and provider quality monitoring.

pub mod monitor;
pub mod optimizer;
pub mod scheduler;

pub use monitor::{MonitorError, ServiceQualityMonitor};
pub use optimizer::{CostOptimizer, CostOptimizerTrait, OptimizerError, QualityMetricsSource};
pub use scheduler::{
	ExecutionObserver, PaymentScheduler, SchedulerDeps, SchedulerError, SchedulerResult,
};
