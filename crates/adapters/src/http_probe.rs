//! HTTP health probes, one per service type

use async_trait::async_trait;
use broker_types::{HealthCheck, HealthProbe, Provider, ServiceType};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::client_cache::ClientCache;

/// Health probe issuing a GET against a service-type specific path
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
	service_type: ServiceType,
	path: String,
	expect_json: bool,
	timeout: Duration,
	cache: ClientCache,
}

impl HttpHealthProbe {
	pub fn new(service_type: ServiceType, path: impl Into<String>, cache: ClientCache) -> Self {
		Self {
			service_type,
			path: path.into(),
			expect_json: false,
			timeout: Duration::from_secs(10),
			cache,
		}
	}

	/// Probe with the conventional health path of a service type
	///
	/// Data feeds must also answer with a JSON body to count as healthy.
	pub fn for_service_type(service_type: ServiceType, cache: ClientCache) -> Self {
		match service_type {
			ServiceType::Weather => Self::new(service_type, "/health", cache),
			ServiceType::Storage => Self::new(service_type, "/health", cache),
			ServiceType::Compute => Self::new(service_type, "/status", cache),
			ServiceType::DataFeed => Self::new(service_type, "/health", cache).expecting_json(),
			ServiceType::Generic => Self::new(service_type, "", cache),
		}
	}

	pub fn expecting_json(mut self) -> Self {
		self.expect_json = true;
		self
	}

	/// Transport-level timeout of the GET request
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	fn url_for(&self, provider: &Provider) -> String {
		format!("{}{}", provider.endpoint.trim_end_matches('/'), self.path)
	}
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
	fn service_type(&self) -> ServiceType {
		self.service_type
	}

	async fn check(&self, provider: &Provider) -> HealthCheck {
		let url = self.url_for(provider);
		let started = Instant::now();
		let elapsed_ms = |started: Instant| started.elapsed().as_millis() as u64;

		let client = match self.cache.client_for(provider) {
			Ok(client) => client,
			Err(e) => return HealthCheck::failed(&provider.id, 0, e.to_string()),
		};

		debug!("Health checking provider {} at {}", provider.id, url);

		let response = match client.get(&url).timeout(self.timeout).send().await {
			Ok(response) => response,
			Err(e) => {
				warn!("Health check of {} failed: {}", provider.id, e);
				return HealthCheck::failed(&provider.id, elapsed_ms(started), e.to_string());
			},
		};

		let status = response.status();
		if !status.is_success() {
			warn!(
				"Provider {} health endpoint returned status {}",
				provider.id, status
			);
			return HealthCheck::unhealthy(
				&provider.id,
				elapsed_ms(started),
				status.as_u16(),
				format!("unhealthy status {}", status),
			);
		}

		if self.expect_json {
			let body = response.text().await.unwrap_or_default();
			if serde_json::from_str::<serde_json::Value>(&body).is_err() {
				return HealthCheck::unhealthy(
					&provider.id,
					elapsed_ms(started),
					status.as_u16(),
					"health endpoint returned invalid JSON",
				);
			}
		}

		HealthCheck::healthy(&provider.id, elapsed_ms(started), status.as_u16())
	}
}
