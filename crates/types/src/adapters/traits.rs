//! Capability traits implemented by provider adapters

use async_trait::async_trait;
use std::fmt::Debug;

use super::AdapterResult;
use crate::monitoring::HealthCheck;
use crate::payments::{PaymentReceipt, ServiceResponse};
use crate::providers::{Provider, ServiceType};
use crate::requests::ServiceRequest;

/// Performs the paid work for a scheduled request
///
/// The scheduler calls `call_service` first and `settle_payment` only when the
/// call succeeded. Both are wrapped in the provider-call timeout by the caller.
#[async_trait]
pub trait ServiceExecutor: Send + Sync + Debug {
	/// Invoke the provider for the given request
	async fn call_service(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
	) -> AdapterResult<ServiceResponse>;

	/// Pay the provider for a completed call
	async fn settle_payment(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
		amount: f64,
		call: &ServiceResponse,
	) -> AdapterResult<PaymentReceipt>;
}

/// Health probe for one service type
///
/// Probes never return errors: an unreachable provider is reported as a failed
/// [`HealthCheck`] so the monitor can record it.
#[async_trait]
pub trait HealthProbe: Send + Sync + Debug {
	/// Service type this probe is registered for
	fn service_type(&self) -> ServiceType;

	async fn check(&self, provider: &Provider) -> HealthCheck;
}
