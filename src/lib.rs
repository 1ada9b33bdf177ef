//! Provider Broker Library
//!
//! Selects external service providers on cost and quality, pays them through
//! a budget-aware job scheduler and keeps their health under watch.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

// Core domain types
pub use broker_types::{
	chrono,
	serde_json,
	Alert,
	AlertSeverity,
	BudgetService,
	CostAnalysis,
	HealthCheck,
	HealthProbe,
	JobState,
	PaymentJob,
	PricingModel,
	Priority,
	Provider,
	ProviderCatalog,
	QualityMetrics,
	QueueStats,
	ReputationScore,
	RequestStatus,
	RequestStore,
	ServiceExecutor,
	ServiceRequest,
	ServiceType,
	StorageError,
};

// Service layer
pub use broker_service::{
	CostOptimizer, CostOptimizerTrait, MonitorError, OptimizerError, PaymentScheduler,
	SchedulerDeps, SchedulerError, ServiceQualityMonitor,
};

// Storage layer
pub use broker_storage::{MemoryBudgetLedger, MemoryStore};

// Adapters
pub use broker_adapters::{
	ClientCache, HttpHealthProbe, HttpServiceExecutor, ProbeRegistry, SimulatedExecutor,
};

// Config
pub use broker_config::{
	load_config, log_service_info, log_service_shutdown, log_startup_complete,
	ConfigValidationError, ExecutionMode, Settings,
};

pub mod models {
	pub use broker_types::*;
}

pub mod storage {
	pub use broker_storage::*;
}

pub mod config {
	pub use broker_config::*;
}

pub mod adapters {
	pub use broker_adapters::*;
}

pub mod service {
	pub use broker_service::*;
}

// Re-export for implementors of the executor and probe traits
pub use async_trait;

/// Errors raised while wiring or driving the broker
#[derive(Debug, Error)]
pub enum BrokerError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigValidationError),

	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),

	#[error("Optimizer error: {0}")]
	Optimizer(#[from] OptimizerError),

	#[error("Scheduler error: {0}")]
	Scheduler(#[from] SchedulerError),

	#[error("Monitor error: {0}")]
	Monitor(#[from] MonitorError),
}

/// Wired broker: catalog, budget ledger, monitor, optimizer and scheduler
pub struct Broker {
	settings: Settings,
	store: MemoryStore,
	budget: MemoryBudgetLedger,
	monitor: ServiceQualityMonitor,
	optimizer: Arc<CostOptimizer>,
	scheduler: PaymentScheduler,
}

impl Broker {
	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn store(&self) -> &MemoryStore {
		&self.store
	}

	pub fn budget(&self) -> &MemoryBudgetLedger {
		&self.budget
	}

	pub fn monitor(&self) -> &ServiceQualityMonitor {
		&self.monitor
	}

	pub fn optimizer(&self) -> &CostOptimizer {
		&self.optimizer
	}

	pub fn scheduler(&self) -> &PaymentScheduler {
		&self.scheduler
	}

	/// Add or replace a provider in the catalog; active ones get monitored
	pub async fn register_provider(&self, provider: Provider) -> Result<(), BrokerError> {
		self.store.upsert_provider(provider.clone()).await?;
		if provider.is_active {
			self.monitor.register_provider(provider);
		} else {
			info!("Provider {} registered inactive, not monitored", provider.id);
		}
		Ok(())
	}

	/// Mark a provider inactive and stop its health checks
	pub async fn deactivate_provider(&self, provider_id: &str) -> Result<(), BrokerError> {
		self.store.deactivate_provider(provider_id).await?;
		if let Err(e) = self.monitor.unregister_provider(provider_id) {
			warn!("Deactivated provider was not monitored: {}", e);
		}
		Ok(())
	}

	/// Schedule `request` with the best catalog provider for its type
	pub async fn submit_request(&self, request: &ServiceRequest) -> Result<String, BrokerError> {
		let providers = self.store.find_by_type(request.service_type).await?;
		let job_id = self
			.scheduler
			.schedule_optimized_payment(request, &providers)
			.await?;
		Ok(job_id)
	}

	/// Stop health checks and drain the scheduler
	pub async fn shutdown(&self) -> Result<(), BrokerError> {
		self.monitor.shutdown();
		self.scheduler.shutdown().await?;
		log_service_shutdown();
		Ok(())
	}
}

/// Builder wiring a [`Broker`] from [`Settings`]
#[derive(Default)]
pub struct BrokerBuilder {
	settings: Option<Settings>,
	store: Option<MemoryStore>,
	probes: Option<ProbeRegistry>,
	executor: Option<Arc<dyn ServiceExecutor>>,
	providers: Vec<Provider>,
}

impl BrokerBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder using the given settings
	pub fn from_config(settings: Settings) -> Self {
		Self::new().with_settings(settings)
	}

	pub fn with_settings(mut self, settings: Settings) -> Self {
		self.settings = Some(settings);
		self
	}

	pub fn settings(&self) -> Option<&Settings> {
		self.settings.as_ref()
	}

	/// Use an existing store as catalog and request store
	pub fn with_store(mut self, store: MemoryStore) -> Self {
		self.store = Some(store);
		self
	}

	/// Replace the default HTTP health probes
	pub fn with_probes(mut self, probes: ProbeRegistry) -> Self {
		self.probes = Some(probes);
		self
	}

	/// Replace the executor selected by `execution.mode`
	pub fn with_executor(mut self, executor: Arc<dyn ServiceExecutor>) -> Self {
		self.executor = Some(executor);
		self
	}

	/// Register a provider in addition to the configured ones
	pub fn with_provider(mut self, provider: Provider) -> Self {
		self.providers.push(provider);
		self
	}

	fn build_executor(settings: &Settings, cache: &ClientCache) -> Arc<dyn ServiceExecutor> {
		let execution = &settings.execution;
		match (&execution.mode, &execution.payment_gateway_url) {
			(ExecutionMode::Http, Some(gateway)) => {
				info!("Executing payments over HTTP via {}", gateway);
				Arc::new(HttpServiceExecutor::new(cache.clone(), gateway.clone()))
			},
			_ => {
				info!(
					"Executing payments in simulation (success rate {:.2})",
					execution.simulated_success_rate
				);
				Arc::new(SimulatedExecutor::new(
					execution.simulated_success_rate,
					Duration::from_millis(execution.simulated_latency_ms),
				))
			},
		}
	}

	/// Validate the settings and wire every component
	///
	/// Must be called inside a tokio runtime: scheduler workers and health
	/// check tasks are spawned here.
	pub async fn build(self) -> Result<Broker, BrokerError> {
		let settings = self.settings.unwrap_or_default();
		settings.validate()?;

		let store = self.store.unwrap_or_default();

		let budget = MemoryBudgetLedger::new(
			settings.budget.default_daily_limit,
			settings.budget.default_monthly_limit,
		);
		for (user_id, limits) in &settings.budget.users {
			budget.set_limits(user_id, limits.daily_limit, limits.monthly_limit);
			if limits.emergency_stop {
				budget.set_emergency_stop(user_id, true);
			}
		}

		let cache = ClientCache::new();
		let probes = self
			.probes
			.unwrap_or_else(|| ProbeRegistry::http_defaults(cache.clone()));
		let monitor = ServiceQualityMonitor::new(settings.monitor.clone(), probes);

		let optimizer = Arc::new(
			CostOptimizer::new(settings.optimizer.clone())?
				.with_metrics_source(Arc::new(monitor.clone())),
		);

		let executor = self
			.executor
			.unwrap_or_else(|| Self::build_executor(&settings, &cache));

		let deps = SchedulerDeps::new(
			optimizer.clone(),
			Arc::new(budget.clone()),
			Arc::new(store.clone()),
			executor,
		)
		.with_catalog(Arc::new(store.clone()))
		.with_observer(Arc::new(monitor.clone()));
		let scheduler = PaymentScheduler::new(deps, settings.scheduler.clone());

		let mut providers = settings.build_providers()?;
		providers.extend(self.providers);

		let broker = Broker {
			settings,
			store,
			budget,
			monitor,
			optimizer,
			scheduler,
		};
		for provider in providers {
			broker.register_provider(provider).await?;
		}

		info!(
			"Broker initialized with {} provider(s)",
			broker.store.list_providers().await?.len()
		);
		Ok(broker)
	}

	/// Run the broker until Ctrl-C
	///
	/// Loads configuration when none was provided, initializes tracing, starts
	/// monitoring and shuts everything down gracefully on interrupt.
	pub async fn start_service(mut self) -> Result<(), Box<dyn std::error::Error>> {
		let using_provided_settings = self.settings.is_some();
		let settings = match self.settings.take() {
			Some(settings) => settings,
			None => load_config()?,
		};

		init_tracing_from_settings(&settings)?;
		log_service_info();
		info!(
			"Using configuration: loaded from {}",
			if using_provided_settings {
				"provided settings"
			} else {
				"config file or defaults"
			}
		);

		self.settings = Some(settings.clone());
		let broker = self.build().await?;
		log_startup_complete(&settings);

		tokio::signal::ctrl_c().await?;
		info!("Interrupt received, shutting down");
		broker.shutdown().await?;
		Ok(())
	}
}

/// Initialize tracing with configuration-based settings
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing_from_settings(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
	use broker_config::LogFormat;

	let log_level = &settings.logging.level;
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	match settings.logging.format {
		LogFormat::Json => {
			let subscriber = tracing_subscriber::fmt().json().with_env_filter(env_filter);

			if settings.logging.structured {
				subscriber.with_target(true).with_thread_ids(true).init();
			} else {
				subscriber.init();
			}
		},
		LogFormat::Pretty => {
			let subscriber = tracing_subscriber::fmt()
				.pretty()
				.with_env_filter(env_filter);

			if settings.logging.structured {
				subscriber.with_target(true).with_thread_ids(true).init();
			} else {
				subscriber.init();
			}
		},
		LogFormat::Compact => {
			let subscriber = tracing_subscriber::fmt()
				.compact()
				.with_env_filter(env_filter);

			if settings.logging.structured {
				subscriber.with_target(true).with_thread_ids(true).init();
			} else {
				subscriber.init();
			}
		},
	}

	info!(
		"Logging configuration applied: level={}, format={:?}, structured={}",
		settings.logging.level, settings.logging.format, settings.logging.structured
	);

	Ok(())
}
