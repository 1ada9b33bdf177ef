//! Error types for provider-facing adapter operations

use thiserror::Error;

/// Errors raised while calling or paying a provider
///
/// Every variant is transient from the scheduler's point of view and is
/// retried according to the job's retry policy.
#[derive(Error, Debug)]
pub enum AdapterError {
	#[error("Service call to {provider_id} failed: {reason}")]
	ServiceCallFailed { provider_id: String, reason: String },

	#[error("Payment to {provider_id} failed: {reason}")]
	PaymentExecutionFailed { provider_id: String, reason: String },

	#[error("Provider did not answer within {timeout_ms}ms")]
	Timeout { timeout_ms: u64 },

	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("HTTP {status_code}: {reason}")]
	HttpStatus { status_code: u16, reason: &'static str },

	#[error("Malformed provider payload: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl AdapterError {
	/// Non-success status from a provider or the payment gateway
	pub fn from_http_failure(status_code: u16) -> Self {
		let reason = match status_code {
			400 => "Bad Request",
			401 => "Unauthorized",
			402 => "Payment Required",
			404 => "Not Found",
			408 => "Request Timeout",
			429 => "Too Many Requests",
			500 => "Internal Server Error",
			502 => "Bad Gateway",
			503 => "Service Unavailable",
			504 => "Gateway Timeout",
			_ => "Unexpected status",
		};
		Self::HttpStatus {
			status_code,
			reason,
		}
	}

	/// Whether the provider failed to answer in time
	pub fn is_timeout(&self) -> bool {
		match self {
			AdapterError::Timeout { .. } => true,
			AdapterError::Http(err) => err.is_timeout(),
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_http_failure_reason() {
		let error = AdapterError::from_http_failure(402);
		assert_eq!(error.to_string(), "HTTP 402: Payment Required");

		let error = AdapterError::from_http_failure(418);
		assert_eq!(error.to_string(), "HTTP 418: Unexpected status");
	}

	#[test]
	fn test_timeout_detection() {
		assert!(AdapterError::Timeout { timeout_ms: 100 }.is_timeout());
		assert!(!AdapterError::from_http_failure(504).is_timeout());
	}
}
