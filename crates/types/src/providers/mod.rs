//! Core Provider domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod errors;
pub mod pricing;

pub use errors::{ProviderValidationError, ProviderValidationResult};
pub use pricing::{FreeTier, PricingKind, PricingModel, PricingTier};

/// Category of work a provider performs
///
/// Also selects the health probe used by the quality monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
	Weather,
	Storage,
	Compute,
	DataFeed,
	Generic,
}

impl ServiceType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ServiceType::Weather => "weather",
			ServiceType::Storage => "storage",
			ServiceType::Compute => "compute",
			ServiceType::DataFeed => "data_feed",
			ServiceType::Generic => "generic",
		}
	}

	pub fn all() -> [ServiceType; 5] {
		[
			ServiceType::Weather,
			ServiceType::Storage,
			ServiceType::Compute,
			ServiceType::DataFeed,
			ServiceType::Generic,
		]
	}
}

impl fmt::Display for ServiceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for ServiceType {
	type Err = ProviderValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"weather" => Ok(ServiceType::Weather),
			"storage" => Ok(ServiceType::Storage),
			"compute" => Ok(ServiceType::Compute),
			"data_feed" | "data-feed" => Ok(ServiceType::DataFeed),
			"generic" => Ok(ServiceType::Generic),
			other => Err(ProviderValidationError::UnknownServiceType {
				service_type: other.to_string(),
			}),
		}
	}
}

/// Standardized quality snapshot consumed by the optimizer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityMetrics {
	/// Uptime percentage (0-100)
	pub uptime: f64,
	/// Average response time in milliseconds
	pub avg_response_time_ms: f64,
	/// Reliability score (0-100)
	pub reliability_score: f64,
	/// Data accuracy percentage (0-100)
	pub data_accuracy: f64,
	/// When this snapshot was produced
	pub last_updated: DateTime<Utc>,
}

impl QualityMetrics {
	pub fn new(
		uptime: f64,
		avg_response_time_ms: f64,
		reliability_score: f64,
		data_accuracy: f64,
	) -> Self {
		Self {
			uptime,
			avg_response_time_ms,
			reliability_score,
			data_accuracy,
			last_updated: Utc::now(),
		}
	}
}

impl Default for QualityMetrics {
	fn default() -> Self {
		Self::new(0.0, 0.0, 0.0, 0.0)
	}
}

/// Provider-tracked usage counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderUsage {
	/// Calls made in the current billing period
	pub requests_this_period: u64,
}

/// External service endpoint characterized by pricing and quality
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
	pub id: String,
	pub name: String,
	pub service_type: ServiceType,
	pub endpoint: String,
	pub pricing: PricingModel,
	pub quality_metrics: QualityMetrics,
	#[serde(default)]
	pub usage: ProviderUsage,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
}

impl Provider {
	pub fn new(
		id: impl Into<String>,
		name: impl Into<String>,
		service_type: ServiceType,
		endpoint: impl Into<String>,
		pricing: PricingModel,
	) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			service_type,
			endpoint: endpoint.into(),
			pricing,
			quality_metrics: QualityMetrics::default(),
			usage: ProviderUsage::default(),
			is_active: true,
			created_at: Utc::now(),
		}
	}

	pub fn with_quality(mut self, quality_metrics: QualityMetrics) -> Self {
		self.quality_metrics = quality_metrics;
		self
	}

	/// Providers are never deleted, only deactivated
	pub fn deactivate(&mut self) {
		self.is_active = false;
	}

	pub fn activate(&mut self) {
		self.is_active = true;
	}

	/// Unit price at the current usage level
	pub fn current_unit_price(&self) -> f64 {
		self.pricing.unit_price(self.usage.requests_this_period)
	}

	/// Record a billed call against the usage counter
	pub fn record_usage(&mut self) {
		self.usage.requests_this_period = self.usage.requests_this_period.saturating_add(1);
	}

	/// Validate the provider record
	pub fn validate(&self) -> ProviderValidationResult<()> {
		if self.id.trim().is_empty() {
			return Err(ProviderValidationError::MissingRequiredField {
				field: "id".to_string(),
			});
		}
		if self.name.trim().is_empty() {
			return Err(ProviderValidationError::MissingRequiredField {
				field: "name".to_string(),
			});
		}
		if !self.pricing.base_price.is_finite() || self.pricing.base_price < 0.0 {
			return Err(ProviderValidationError::InvalidPrice {
				provider_id: self.id.clone(),
				price: self.pricing.base_price,
			});
		}
		if let Some(tier) = self
			.pricing
			.tiers
			.iter()
			.find(|tier| !tier.price.is_finite() || tier.price < 0.0)
		{
			return Err(ProviderValidationError::InvalidPrice {
				provider_id: self.id.clone(),
				price: tier.price,
			});
		}

		let metrics = &self.quality_metrics;
		for (name, value) in [
			("uptime", metrics.uptime),
			("reliability_score", metrics.reliability_score),
			("data_accuracy", metrics.data_accuracy),
		] {
			if !(0.0..=100.0).contains(&value) {
				return Err(ProviderValidationError::MetricOutOfRange {
					metric: name.to_string(),
					value,
				});
			}
		}
		if metrics.avg_response_time_ms < 0.0 {
			return Err(ProviderValidationError::MetricOutOfRange {
				metric: "avg_response_time_ms".to_string(),
				value: metrics.avg_response_time_ms,
			});
		}

		Ok(())
	}
}
