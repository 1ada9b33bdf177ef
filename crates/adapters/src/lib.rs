//! Broker Adapters
//!
//! Provider-facing adapters for the provider broker: HTTP health probes,
//! service executors and the probe registry used by the quality monitor.

pub mod client_cache;
pub mod http_executor;
pub mod http_probe;
pub mod probe_registry;
pub mod simulated;

pub use broker_types::{AdapterError, AdapterResult, HealthProbe, ServiceExecutor};
pub use client_cache::{ClientCache, ClientConfig};
pub use http_executor::HttpServiceExecutor;
pub use http_probe::HttpHealthProbe;
pub use probe_registry::ProbeRegistry;
pub use simulated::SimulatedExecutor;
