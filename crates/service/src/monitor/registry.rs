//! Provider registry owned by the quality monitor

use broker_types::{Provider, QualityMetrics};
use dashmap::DashMap;

/// Monitored providers indexed by id
#[derive(Debug, Default)]
pub struct ProviderRegistry {
	providers: DashMap<String, Provider>,
}

impl ProviderRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace a provider, returning the previous record
	pub fn insert(&self, provider: Provider) -> Option<Provider> {
		self.providers.insert(provider.id.clone(), provider)
	}

	pub fn get(&self, provider_id: &str) -> Option<Provider> {
		self.providers
			.get(provider_id)
			.map(|entry| entry.value().clone())
	}

	pub fn contains(&self, provider_id: &str) -> bool {
		self.providers.contains_key(provider_id)
	}

	/// Replace the quality snapshot of a provider; false if unknown
	pub fn update_quality(&self, provider_id: &str, metrics: QualityMetrics) -> bool {
		match self.providers.get_mut(provider_id) {
			Some(mut entry) => {
				entry.quality_metrics = metrics;
				true
			},
			None => false,
		}
	}

	/// All providers sorted by id
	pub fn all(&self) -> Vec<Provider> {
		let mut providers: Vec<Provider> = self
			.providers
			.iter()
			.map(|entry| entry.value().clone())
			.collect();
		providers.sort_by(|a, b| a.id.cmp(&b.id));
		providers
	}

	pub fn len(&self) -> usize {
		self.providers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}
