//! Scheduler error types and injected collaborators

use broker_types::{
	BudgetService, ProviderCatalog, RequestStore, ServiceExecutor, StorageError,
};
use std::sync::Arc;
use thiserror::Error;

use crate::optimizer::{CostOptimizerTrait, OptimizerError};

/// Errors that can occur while scheduling or administering payment jobs
#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("Budget exceeded for user '{user_id}': {reason}")]
	BudgetExceeded { user_id: String, reason: String },

	#[error("No suitable provider: {reason}")]
	NoSuitableProvider { reason: String },

	#[error("Provider '{provider_id}' cannot serve this request: {reason}")]
	ProviderUnavailable { provider_id: String, reason: String },

	#[error("All providers failed (tried {tried:?}): {last_error}")]
	AllProvidersFailed {
		tried: Vec<String>,
		last_error: String,
	},

	#[error("Optimizer error: {0}")]
	Optimizer(#[from] OptimizerError),

	#[error("Payment queue is full")]
	QueueFull,

	#[error("Payment scheduler is shutting down")]
	ShuttingDown,

	#[error("Job '{job_id}' not found")]
	JobNotFound { job_id: String },

	#[error("Cannot {operation} job '{job_id}' in state '{state}'")]
	InvalidJobState {
		job_id: String,
		state: String,
		operation: String,
	},

	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Result type for scheduler operations
pub type SchedulerResult<T = ()> = Result<T, SchedulerError>;

/// Receives the outcome of every provider call made by the scheduler
#[cfg_attr(test, mockall::automock)]
pub trait ExecutionObserver: Send + Sync {
	fn record_execution(&self, provider_id: &str, response_time_ms: u64, success: bool);
}

/// Collaborators the scheduler runs against
#[derive(Clone)]
pub struct SchedulerDeps {
	pub optimizer: Arc<dyn CostOptimizerTrait>,
	pub budget: Arc<dyn BudgetService>,
	pub requests: Arc<dyn RequestStore>,
	pub executor: Arc<dyn ServiceExecutor>,
	/// Usage counters are bumped here after successful executions
	pub catalog: Option<Arc<dyn ProviderCatalog>>,
	pub observer: Option<Arc<dyn ExecutionObserver>>,
}

impl SchedulerDeps {
	pub fn new(
		optimizer: Arc<dyn CostOptimizerTrait>,
		budget: Arc<dyn BudgetService>,
		requests: Arc<dyn RequestStore>,
		executor: Arc<dyn ServiceExecutor>,
	) -> Self {
		Self {
			optimizer,
			budget,
			requests,
			executor,
			catalog: None,
			observer: None,
		}
	}

	pub fn with_catalog(mut self, catalog: Arc<dyn ProviderCatalog>) -> Self {
		self.catalog = Some(catalog);
		self
	}

	pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
		self.observer = Some(observer);
		self
	}
}
