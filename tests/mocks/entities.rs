//! Domain entity mocks for testing

use provider_broker::{
	serde_json::json, PricingModel, Priority, Provider, QualityMetrics, ServiceRequest,
	ServiceType,
};

/// Entity builders for tests
#[allow(dead_code)]
pub struct MockEntities;

#[allow(dead_code)]
impl MockEntities {
	pub const USER: &'static str = "user-1";

	/// Weather provider charging `price` per request
	pub fn weather_provider(id: &str, price: f64, reliability: f64) -> Provider {
		Provider::new(
			id,
			format!("Weather {}", id),
			ServiceType::Weather,
			format!("http://{}.weather.local", id),
			PricingModel::per_request(price),
		)
		.with_quality(QualityMetrics::new(99.0, 120.0, reliability, 95.0))
	}

	/// Cheap, reliable provider and a pricier, slightly less reliable one
	pub fn weather_pair() -> (Provider, Provider) {
		(
			Self::weather_provider("provider-a", 0.0015, 95.0),
			Self::weather_provider("provider-b", 0.004, 92.0),
		)
	}

	pub fn weather_request(id: &str) -> ServiceRequest {
		ServiceRequest::new(id, Self::USER, ServiceType::Weather, 1.0)
			.with_parameters(json!({"city": "Lisbon"}))
	}

	pub fn urgent_request(id: &str) -> ServiceRequest {
		Self::weather_request(id).with_priority(Priority::Critical)
	}
}
