//! Scripted health probe for integration tests

use async_trait::async_trait;
use provider_broker::{HealthCheck, HealthProbe, Provider, ServiceType};
use std::collections::HashMap;
use std::sync::Mutex;

/// Probe answering with a per-provider status code
///
/// Providers without a scripted status are healthy; `None` means the
/// provider could not be reached.
#[derive(Debug)]
pub struct ScriptedProbe {
	service_type: ServiceType,
	statuses: Mutex<HashMap<String, Option<u16>>>,
	response_time_ms: u64,
}

#[allow(dead_code)]
impl ScriptedProbe {
	pub fn new(service_type: ServiceType) -> Self {
		Self {
			service_type,
			statuses: Mutex::new(HashMap::new()),
			response_time_ms: 40,
		}
	}

	pub fn set_status(&self, provider_id: &str, status: Option<u16>) {
		self.statuses
			.lock()
			.unwrap()
			.insert(provider_id.to_string(), status);
	}
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
	fn service_type(&self) -> ServiceType {
		self.service_type
	}

	async fn check(&self, provider: &Provider) -> HealthCheck {
		let status = self
			.statuses
			.lock()
			.unwrap()
			.get(&provider.id)
			.copied()
			.unwrap_or(Some(200));
		match status {
			Some(code) if code < 400 => {
				HealthCheck::healthy(&provider.id, self.response_time_ms, code)
			},
			Some(code) => HealthCheck::unhealthy(
				&provider.id,
				self.response_time_ms,
				code,
				format!("HTTP {}", code),
			),
			None => HealthCheck::failed(&provider.id, self.response_time_ms, "connection refused"),
		}
	}
}
