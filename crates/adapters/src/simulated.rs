//! Deterministic in-process executor for demos and tests

use async_trait::async_trait;
use broker_types::{
	AdapterError, AdapterResult, PaymentReceipt, Provider, ServiceExecutor, ServiceRequest,
	ServiceResponse,
};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Executor that simulates provider calls and settlements
///
/// Whether a settlement succeeds is decided by hashing the request id together
/// with the attempt number, so a run is reproducible while retries can still
/// succeed. Attempt counters are dropped once a request settles.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
	success_rate: f64,
	latency: Duration,
	attempts: Arc<DashMap<String, u32>>,
}

impl SimulatedExecutor {
	pub fn new(success_rate: f64, latency: Duration) -> Self {
		Self {
			success_rate: success_rate.clamp(0.0, 1.0),
			latency,
			attempts: Arc::new(DashMap::new()),
		}
	}

	/// Failed settlement attempts for a request that has not settled yet
	pub fn attempts_for(&self, request_id: &str) -> u32 {
		self.attempts.get(request_id).map(|n| *n).unwrap_or(0)
	}

	fn settles(&self, request_id: &str, attempt: u32) -> bool {
		let mut hasher = DefaultHasher::new();
		request_id.hash(&mut hasher);
		attempt.hash(&mut hasher);
		let bucket = hasher.finish() % 10_000;
		(bucket as f64) < self.success_rate * 10_000.0
	}
}

impl Default for SimulatedExecutor {
	fn default() -> Self {
		Self::new(0.9, Duration::from_millis(50))
	}
}

#[async_trait]
impl ServiceExecutor for SimulatedExecutor {
	async fn call_service(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
	) -> AdapterResult<ServiceResponse> {
		if !self.latency.is_zero() {
			tokio::time::sleep(self.latency).await;
		}
		Ok(ServiceResponse {
			data: json!({
				"provider_id": provider.id,
				"service_type": provider.service_type,
				"request_id": request.id,
				"parameters": request.parameters,
				"simulated": true,
			}),
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
		let attempt = {
			let mut entry = self.attempts.entry(request.id.clone()).or_insert(0);
			*entry += 1;
			*entry
		};

		if !self.settles(&request.id, attempt) {
			debug!(
				"Simulated settlement of {} to {} failed (attempt {})",
				request.id, provider.id, attempt
			);
			return Err(AdapterError::PaymentExecutionFailed {
				provider_id: provider.id.clone(),
				reason: "simulated transaction rejected".to_string(),
			});
		}

		self.attempts.remove(&request.id);
		Ok(PaymentReceipt {
			transaction_id: format!("sim-{}", uuid::Uuid::new_v4()),
			amount,
			settled_at: Utc::now(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use broker_types::{PricingModel, ServiceType};

	fn fixtures() -> (ServiceRequest, Provider) {
		(
			ServiceRequest::new("req-1", "user-1", ServiceType::Weather, 1.0),
			Provider::new(
				"p1",
				"P1",
				ServiceType::Weather,
				"http://p1.local",
				PricingModel::per_request(0.01),
			),
		)
	}

	#[tokio::test]
	async fn test_always_succeeds_at_full_rate() {
		let executor = SimulatedExecutor::new(1.0, Duration::ZERO);
		let (request, provider) = fixtures();

		let call = executor.call_service(&request, &provider).await.unwrap();
		assert_eq!(call.data["provider_id"], "p1");
		let receipt = executor
			.settle_payment(&request, &provider, 0.5, &call)
			.await
			.unwrap();
		assert_eq!(receipt.amount, 0.5);
		assert!(receipt.transaction_id.starts_with("sim-"));
	}

	#[tokio::test]
	async fn test_never_settles_at_zero_rate() {
		let executor = SimulatedExecutor::new(0.0, Duration::ZERO);
		let (request, provider) = fixtures();

		let call = executor.call_service(&request, &provider).await.unwrap();
		let result = executor.settle_payment(&request, &provider, 0.5, &call).await;
		assert!(matches!(
			result,
			Err(AdapterError::PaymentExecutionFailed { .. })
		));
		assert_eq!(executor.attempts_for("req-1"), 1);
	}

	#[tokio::test]
	async fn test_settled_requests_are_forgotten() {
		let executor = SimulatedExecutor::new(1.0, Duration::ZERO);
		let (request, provider) = fixtures();

		let call = executor.call_service(&request, &provider).await.unwrap();
		for _ in 0..3 {
			executor
				.settle_payment(&request, &provider, 0.5, &call)
				.await
				.unwrap();
		}
		assert_eq!(executor.attempts_for("req-1"), 0);
		assert!(executor.attempts.is_empty());
	}

	#[test]
	fn test_outcome_is_deterministic() {
		let a = SimulatedExecutor::new(0.5, Duration::ZERO);
		let b = SimulatedExecutor::new(0.5, Duration::ZERO);
		for i in 0..20 {
			let id = format!("req-{}", i);
			assert_eq!(a.settles(&id, 1), b.settles(&id, 1));
		}
	}
}
