//! Pooled HTTP clients keyed by endpoint
//!
//! Probes and executors hit the same provider over and over, so one
//! `reqwest::Client` (and its connection pool) is kept per endpoint and
//! rebuilt once it outlives the cache TTL.

use broker_types::{AdapterError, AdapterResult, Provider};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const USER_AGENT_VALUE: &str = "Provider-Broker/1.0";
const MAX_IDLE_PER_HOST: usize = 10;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Identity of a pooled client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientConfig {
	/// Provider id, or a fixed name for non-provider endpoints
	pub name: String,
	pub base_url: String,
	/// Sent as `X-Service-Type` when set
	pub service_type: Option<String>,
}

impl From<&Provider> for ClientConfig {
	fn from(provider: &Provider) -> Self {
		Self {
			name: provider.id.clone(),
			base_url: provider.endpoint.clone(),
			service_type: Some(provider.service_type.to_string()),
		}
	}
}

impl ClientConfig {
	/// Client identity for an endpoint that is not a provider (e.g. the payment gateway)
	pub fn for_endpoint(name: &str, base_url: &str) -> Self {
		Self {
			name: name.to_string(),
			base_url: base_url.to_string(),
			service_type: None,
		}
	}

	fn default_headers(&self) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		if let Some(service_type) = &self.service_type {
			if let Ok(value) = HeaderValue::from_str(service_type) {
				headers.insert(HeaderName::from_static("x-service-type"), value);
			}
		}
		headers
	}

	fn build(&self) -> AdapterResult<Client> {
		Client::builder()
			.pool_max_idle_per_host(MAX_IDLE_PER_HOST)
			.pool_idle_timeout(POOL_IDLE_TIMEOUT)
			.tcp_keepalive(Duration::from_secs(60))
			.default_headers(self.default_headers())
			.build()
			.map_err(AdapterError::Http)
	}
}

#[derive(Debug)]
struct PooledClient {
	client: Arc<Client>,
	built_at: Instant,
}

/// Shared client pool; clones share the same entries
#[derive(Clone, Debug)]
pub struct ClientCache {
	clients: Arc<DashMap<ClientConfig, PooledClient>>,
	ttl: Duration,
}

impl ClientCache {
	pub fn new() -> Self {
		Self::with_ttl(DEFAULT_TTL)
	}

	pub fn with_ttl(ttl: Duration) -> Self {
		Self {
			clients: Arc::new(DashMap::new()),
			ttl,
		}
	}

	/// Client for `config`, built on first use or after the TTL lapses
	pub fn get_client(&self, config: &ClientConfig) -> AdapterResult<Arc<Client>> {
		match self.clients.entry(config.clone()) {
			Entry::Occupied(mut entry) => {
				if entry.get().built_at.elapsed() <= self.ttl {
					return Ok(entry.get().client.clone());
				}
				debug!("Rebuilding stale client for {}", config.name);
				let client = Arc::new(config.build()?);
				entry.insert(PooledClient {
					client: client.clone(),
					built_at: Instant::now(),
				});
				Ok(client)
			},
			Entry::Vacant(entry) => {
				debug!("Building client for {} ({})", config.name, config.base_url);
				let client = Arc::new(config.build()?);
				entry.insert(PooledClient {
					client: client.clone(),
					built_at: Instant::now(),
				});
				Ok(client)
			},
		}
	}

	pub fn client_for(&self, provider: &Provider) -> AdapterResult<Arc<Client>> {
		self.get_client(&ClientConfig::from(provider))
	}

	/// Drops clients older than the TTL, returning how many were removed
	pub fn cleanup_expired(&self) -> usize {
		let before = self.clients.len();
		self.clients
			.retain(|_, pooled| pooled.built_at.elapsed() <= self.ttl);
		let removed = before.saturating_sub(self.clients.len());
		if removed > 0 {
			debug!("Dropped {} stale HTTP clients", removed);
		}
		removed
	}

	pub fn len(&self) -> usize {
		self.clients.len()
	}

	pub fn is_empty(&self) -> bool {
		self.clients.is_empty()
	}
}

impl Default for ClientCache {
	fn default() -> Self {
		Self::new()
	}
}
