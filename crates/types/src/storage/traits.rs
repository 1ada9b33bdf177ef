//! Collaborator traits for provider, request and budget state

use async_trait::async_trait;
use serde_json::Value;

use super::StorageResult;
use crate::payments::BudgetCheck;
use crate::providers::{Provider, ServiceType};
use crate::requests::{RequestStatus, ServiceRequest};

/// Provider records, keyed by id
#[async_trait]
pub trait ProviderCatalog: Send + Sync {
	/// All providers (active or not) of a service type
	async fn find_by_type(&self, service_type: ServiceType) -> StorageResult<Vec<Provider>>;

	async fn find_by_id(&self, provider_id: &str) -> StorageResult<Option<Provider>>;

	/// Insert or replace a provider record
	async fn upsert_provider(&self, provider: Provider) -> StorageResult<()>;

	/// Mark a provider inactive; records are never removed
	async fn deactivate_provider(&self, provider_id: &str) -> StorageResult<()>;

	async fn list_providers(&self) -> StorageResult<Vec<Provider>>;

	/// Increment the provider's usage counter after a billed call
	async fn record_usage(&self, provider_id: &str) -> StorageResult<()>;
}

/// Service request state
#[async_trait]
pub trait RequestStore: Send + Sync {
	async fn create_request(&self, request: ServiceRequest) -> StorageResult<()>;

	async fn get_request(&self, request_id: &str) -> StorageResult<Option<ServiceRequest>>;

	/// Apply a status transition; `NotFound` for unknown ids
	async fn update_status(
		&self,
		request_id: &str,
		status: RequestStatus,
		response_data: Option<Value>,
		error: Option<String>,
	) -> StorageResult<()>;
}

/// Per-user spending limits
#[async_trait]
pub trait BudgetService: Send + Sync {
	/// Whether `amount` may be spent now without breaching any limit
	async fn check_limits(&self, user_id: &str, amount: f64) -> StorageResult<BudgetCheck>;

	async fn record_spend(&self, user_id: &str, amount: f64) -> StorageResult<()>;
}
