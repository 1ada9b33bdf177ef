//! HTTP executor calling provider endpoints and a payment gateway

use async_trait::async_trait;
use broker_types::{
	AdapterError, AdapterResult, PaymentReceipt, Provider, ServiceExecutor, ServiceRequest,
	ServiceResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::client_cache::{ClientCache, ClientConfig};

/// Body posted to the provider endpoint
#[derive(Debug, Serialize)]
struct ServiceCallBody<'a> {
	request_id: &'a str,
	service_type: &'a str,
	parameters: &'a Value,
}

/// Body posted to the payment gateway
#[derive(Debug, Serialize)]
struct SettlementBody<'a> {
	request_id: &'a str,
	user_id: &'a str,
	provider_id: &'a str,
	amount: f64,
}

#[derive(Debug, Deserialize)]
struct SettlementReply {
	transaction_id: String,
}

/// Executor posting requests to providers and settlements to a gateway
#[derive(Debug, Clone)]
pub struct HttpServiceExecutor {
	cache: ClientCache,
	gateway: ClientConfig,
}

impl HttpServiceExecutor {
	pub fn new(cache: ClientCache, payment_gateway_url: impl Into<String>) -> Self {
		let url = payment_gateway_url.into();
		Self {
			cache,
			gateway: ClientConfig::for_endpoint("payment-gateway", &url),
		}
	}
}

#[async_trait]
impl ServiceExecutor for HttpServiceExecutor {
	async fn call_service(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
	) -> AdapterResult<ServiceResponse> {
		let client = self.cache.client_for(provider)?;
		let body = ServiceCallBody {
			request_id: &request.id,
			service_type: provider.service_type.as_str(),
			parameters: &request.parameters,
		};

		debug!(
			"Calling provider {} at {} for request {}",
			provider.id, provider.endpoint, request.id
		);
		let started = Instant::now();
		let response = client.post(&provider.endpoint).json(&body).send().await?;
		let status = response.status();
		let response_time_ms = started.elapsed().as_millis() as u64;

		if !status.is_success() {
			warn!(
				"Provider {} returned {} for request {}",
				provider.id, status, request.id
			);
			return Err(AdapterError::ServiceCallFailed {
				provider_id: provider.id.clone(),
				reason: AdapterError::from_http_failure(status.as_u16()).to_string(),
			});
		}

		let text = response.text().await?;
		let data = if text.trim().is_empty() {
			Value::Null
		} else {
			serde_json::from_str(&text)?
		};

		Ok(ServiceResponse {
			data,
			response_time_ms,
			status_code: Some(status.as_u16()),
		})
	}

	async fn settle_payment(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
		amount: f64,
		_call: &ServiceResponse,
	) -> AdapterResult<PaymentReceipt> {
		let client = self.cache.get_client(&self.gateway)?;
		let body = SettlementBody {
			request_id: &request.id,
			user_id: &request.user_id,
			provider_id: &provider.id,
			amount,
		};

		let response = client
			.post(&self.gateway.base_url)
			.json(&body)
			.send()
			.await
			.map_err(|e| AdapterError::PaymentExecutionFailed {
				provider_id: provider.id.clone(),
				reason: e.to_string(),
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(AdapterError::PaymentExecutionFailed {
				provider_id: provider.id.clone(),
				reason: AdapterError::from_http_failure(status.as_u16()).to_string(),
			});
		}

		let reply: SettlementReply =
			response
				.json()
				.await
				.map_err(|e| AdapterError::PaymentExecutionFailed {
					provider_id: provider.id.clone(),
					reason: format!("invalid gateway reply: {}", e),
				})?;

		info!(
			"Settled {:.6} to {} for request {} (tx {})",
			amount, provider.id, request.id, reply.transaction_id
		);
		Ok(PaymentReceipt {
			transaction_id: reply.transaction_id,
			amount,
			settled_at: Utc::now(),
		})
	}
}
