//! In-memory provider catalog and request store using DashMap

use async_trait::async_trait;
use broker_types::{
	Provider, ProviderCatalog, RequestStatus, RequestStore, ServiceRequest, ServiceType,
	StorageError, StorageResult,
};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// In-memory storage for providers and service requests
#[derive(Clone, Default)]
pub struct MemoryStore {
	pub providers: Arc<DashMap<String, Provider>>,
	pub requests: Arc<DashMap<String, ServiceRequest>>,
}

impl MemoryStore {
	/// Create a new memory store instance
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a store pre-populated with providers
	pub fn with_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
		let store = Self::new();
		for provider in providers {
			store.providers.insert(provider.id.clone(), provider);
		}
		store
	}

	/// Get active providers only
	pub fn active_providers(&self) -> Vec<Provider> {
		let mut providers: Vec<Provider> = self
			.providers
			.iter()
			.filter(|entry| entry.value().is_active)
			.map(|entry| entry.value().clone())
			.collect();
		providers.sort_by(|a, b| a.id.cmp(&b.id));
		providers
	}

	/// Get requests submitted by a user
	pub fn requests_by_user(&self, user_id: &str) -> Vec<ServiceRequest> {
		self.requests
			.iter()
			.filter(|entry| entry.value().user_id == user_id)
			.map(|entry| entry.value().clone())
			.collect()
	}

	/// Get requests with a specific status
	pub fn requests_by_status(&self, status: RequestStatus) -> Vec<ServiceRequest> {
		self.requests
			.iter()
			.filter(|entry| entry.value().status == status)
			.map(|entry| entry.value().clone())
			.collect()
	}
}

#[async_trait]
impl ProviderCatalog for MemoryStore {
	async fn find_by_type(&self, service_type: ServiceType) -> StorageResult<Vec<Provider>> {
		let mut providers: Vec<Provider> = self
			.providers
			.iter()
			.filter(|entry| entry.value().service_type == service_type)
			.map(|entry| entry.value().clone())
			.collect();
		providers.sort_by(|a, b| a.id.cmp(&b.id));
		Ok(providers)
	}

	async fn find_by_id(&self, provider_id: &str) -> StorageResult<Option<Provider>> {
		Ok(self.providers.get(provider_id).map(|p| p.clone()))
	}

	async fn upsert_provider(&self, provider: Provider) -> StorageResult<()> {
		provider
			.validate()
			.map_err(|e| StorageError::Validation {
				message: e.to_string(),
			})?;
		info!(
			"Registering provider {} ({}) at {}",
			provider.id, provider.service_type, provider.endpoint
		);
		self.providers.insert(provider.id.clone(), provider);
		Ok(())
	}

	async fn deactivate_provider(&self, provider_id: &str) -> StorageResult<()> {
		let mut entry = self
			.providers
			.get_mut(provider_id)
			.ok_or_else(|| StorageError::NotFound {
				id: provider_id.to_string(),
			})?;
		entry.deactivate();
		info!("Deactivated provider {}", provider_id);
		Ok(())
	}

	async fn list_providers(&self) -> StorageResult<Vec<Provider>> {
		let mut providers: Vec<Provider> =
			self.providers.iter().map(|entry| entry.clone()).collect();
		providers.sort_by(|a, b| a.id.cmp(&b.id));
		Ok(providers)
	}

	async fn record_usage(&self, provider_id: &str) -> StorageResult<()> {
		let mut entry = self
			.providers
			.get_mut(provider_id)
			.ok_or_else(|| StorageError::NotFound {
				id: provider_id.to_string(),
			})?;
		entry.record_usage();
		Ok(())
	}
}

#[async_trait]
impl RequestStore for MemoryStore {
	async fn create_request(&self, request: ServiceRequest) -> StorageResult<()> {
		if self.requests.contains_key(&request.id) {
			return Err(StorageError::AlreadyExists { id: request.id });
		}
		self.requests.insert(request.id.clone(), request);
		Ok(())
	}

	async fn get_request(&self, request_id: &str) -> StorageResult<Option<ServiceRequest>> {
		Ok(self.requests.get(request_id).map(|r| r.clone()))
	}

	async fn update_status(
		&self,
		request_id: &str,
		status: RequestStatus,
		response_data: Option<Value>,
		error: Option<String>,
	) -> StorageResult<()> {
		let mut entry = self
			.requests
			.get_mut(request_id)
			.ok_or_else(|| StorageError::NotFound {
				id: request_id.to_string(),
			})?;
		debug!(
			"Request {} status {} -> {}",
			request_id,
			entry.status.as_str(),
			status.as_str()
		);
		entry.apply_status(status, response_data, error);
		Ok(())
	}
}
