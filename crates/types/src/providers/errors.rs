//! Error types for provider records

use thiserror::Error;

/// Validation errors for provider records
#[derive(Error, Debug)]
pub enum ProviderValidationError {
	#[error("Missing required field: {field}")]
	MissingRequiredField { field: String },

	#[error("Invalid price {price} for provider {provider_id}")]
	InvalidPrice { provider_id: String, price: f64 },

	#[error("Metric {metric} out of range: {value}")]
	MetricOutOfRange { metric: String, value: f64 },

	#[error("Unknown service type: {service_type}")]
	UnknownServiceType { service_type: String },
}

pub type ProviderValidationResult<T> = Result<T, ProviderValidationError>;
