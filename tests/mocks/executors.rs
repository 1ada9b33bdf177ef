//! Scripted service executor for integration tests

use async_trait::async_trait;
use provider_broker::chrono::Utc;
use provider_broker::models::{AdapterError, AdapterResult, PaymentReceipt, ServiceResponse};
use provider_broker::serde_json::json;
use provider_broker::{Provider, ServiceExecutor, ServiceRequest};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// Executor that fails every call to the configured providers
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
	failing_providers: Mutex<HashSet<String>>,
	latency: Duration,
	settled: Mutex<Vec<(String, String, f64)>>,
}

#[allow(dead_code)]
impl ScriptedExecutor {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_latency(latency: Duration) -> Self {
		Self {
			latency,
			..Self::default()
		}
	}

	pub fn fail_provider(&self, provider_id: &str) {
		self.failing_providers
			.lock()
			.unwrap()
			.insert(provider_id.to_string());
	}

	/// Settled payments as (request id, provider id, amount)
	pub fn settled(&self) -> Vec<(String, String, f64)> {
		self.settled.lock().unwrap().clone()
	}
}

#[async_trait]
impl ServiceExecutor for ScriptedExecutor {
	async fn call_service(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
	) -> AdapterResult<ServiceResponse> {
		if !self.latency.is_zero() {
			tokio::time::sleep(self.latency).await;
		}
		if self
			.failing_providers
			.lock()
			.unwrap()
			.contains(&provider.id)
		{
			return Err(AdapterError::ServiceCallFailed {
				provider_id: provider.id.clone(),
				reason: "scripted failure".to_string(),
			});
		}
		Ok(ServiceResponse {
			data: json!({"request_id": request.id, "provider_id": provider.id}),
			response_time_ms: self.latency.as_millis() as u64,
			status_code: Some(200),
		})
	}

	async fn settle_payment(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
		amount: f64,
		_call: &ServiceResponse,
	) -> AdapterResult<PaymentReceipt> {
		self.settled
			.lock()
			.unwrap()
			.push((request.id.clone(), provider.id.clone(), amount));
		Ok(PaymentReceipt {
			transaction_id: format!("tx-{}", request.id),
			amount,
			settled_at: Utc::now(),
		})
	}
}
