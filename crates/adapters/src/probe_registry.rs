//! Health probe dispatch by service type

use broker_types::{HealthProbe, ServiceType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::client_cache::ClientCache;
use crate::http_probe::HttpHealthProbe;

/// Maps each service type to the probe that checks it
///
/// Types without a registered probe use the fallback probe.
#[derive(Debug, Clone)]
pub struct ProbeRegistry {
	probes: HashMap<ServiceType, Arc<dyn HealthProbe>>,
	fallback: Arc<dyn HealthProbe>,
}

impl ProbeRegistry {
	pub fn new(fallback: Arc<dyn HealthProbe>) -> Self {
		Self {
			probes: HashMap::new(),
			fallback,
		}
	}

	/// Registry with an HTTP probe for every service type
	pub fn http_defaults(cache: ClientCache) -> Self {
		let fallback: Arc<dyn HealthProbe> = Arc::new(HttpHealthProbe::for_service_type(
			ServiceType::Generic,
			cache.clone(),
		));
		let mut registry = Self::new(fallback);
		for service_type in ServiceType::all() {
			registry.register(Arc::new(HttpHealthProbe::for_service_type(
				service_type,
				cache.clone(),
			)));
		}
		registry
	}

	/// Register a probe under the service type it reports
	pub fn register(&mut self, probe: Arc<dyn HealthProbe>) {
		let service_type = probe.service_type();
		debug!("Registering health probe for {}", service_type);
		self.probes.insert(service_type, probe);
	}

	pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
		self.register(probe);
		self
	}

	/// Probe for a service type, or the fallback
	pub fn probe_for(&self, service_type: ServiceType) -> Arc<dyn HealthProbe> {
		self.probes
			.get(&service_type)
			.cloned()
			.unwrap_or_else(|| self.fallback.clone())
	}

	pub fn has_probe(&self, service_type: ServiceType) -> bool {
		self.probes.contains_key(&service_type)
	}
}
