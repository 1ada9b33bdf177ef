//! Health, reputation and alert models produced by the quality monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a single provider health check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthCheck {
	pub provider_id: String,
	pub timestamp: DateTime<Utc>,
	pub is_healthy: bool,
	pub response_time_ms: u64,
	pub error_message: Option<String>,
	pub status_code: Option<u16>,
}

impl HealthCheck {
	pub fn healthy(provider_id: impl Into<String>, response_time_ms: u64, status_code: u16) -> Self {
		Self {
			provider_id: provider_id.into(),
			timestamp: Utc::now(),
			is_healthy: true,
			response_time_ms,
			error_message: None,
			status_code: Some(status_code),
		}
	}

	/// The provider answered but reported a problem
	pub fn unhealthy(
		provider_id: impl Into<String>,
		response_time_ms: u64,
		status_code: u16,
		error_message: impl Into<String>,
	) -> Self {
		Self {
			provider_id: provider_id.into(),
			timestamp: Utc::now(),
			is_healthy: false,
			response_time_ms,
			error_message: Some(error_message.into()),
			status_code: Some(status_code),
		}
	}

	/// The check itself could not complete (transport error or timeout)
	pub fn failed(
		provider_id: impl Into<String>,
		response_time_ms: u64,
		error_message: impl Into<String>,
	) -> Self {
		Self {
			provider_id: provider_id.into(),
			timestamp: Utc::now(),
			is_healthy: false,
			response_time_ms,
			error_message: Some(error_message.into()),
			status_code: None,
		}
	}

	/// True when no response was obtained at all
	pub fn is_unreachable(&self) -> bool {
		!self.is_healthy && self.status_code.is_none()
	}
}

/// Origin of a performance sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SampleSource {
	HealthCheck,
	Execution,
}

/// Response time / success observation used for rolling metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSample {
	pub timestamp: DateTime<Utc>,
	pub response_time_ms: u64,
	pub success: bool,
	pub source: SampleSource,
}

/// Direction of recent health
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
	Improving,
	#[default]
	Stable,
	Declining,
}

/// Inputs of the reputation score
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReputationFactors {
	/// Percentage of healthy checks (0-100)
	pub uptime: f64,
	/// Average response time in milliseconds
	pub avg_response_time: f64,
	/// Percentage of failed samples (0-100)
	pub error_rate: f64,
	/// Data accuracy percentage (0-100)
	pub data_accuracy: f64,
	/// Step score of the provider's unit price (0-100)
	pub cost_effectiveness: f64,
}

/// Time-windowed, multi-factor quality signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReputationScore {
	pub provider_id: String,
	/// Weighted score in [0, 100]
	pub score: f64,
	pub factors: ReputationFactors,
	pub trend: Trend,
	/// Number of health checks inside the window
	pub sample_count: usize,
	/// Timestamp of the newest sample used (None without data)
	pub last_updated: Option<DateTime<Utc>>,
}

impl ReputationScore {
	/// Score of a provider without any history
	pub fn empty(provider_id: impl Into<String>) -> Self {
		Self {
			provider_id: provider_id.into(),
			score: 0.0,
			factors: ReputationFactors::default(),
			trend: Trend::Stable,
			sample_count: 0,
			last_updated: None,
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
	ServiceDown,
	PerformanceDegradation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
	Low,
	Medium,
	High,
	Critical,
}

/// Notification raised by the quality monitor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
	pub id: String,
	pub alert_type: AlertType,
	pub severity: AlertSeverity,
	pub message: String,
	pub details: Value,
	pub provider_id: Option<String>,
	pub is_resolved: bool,
	pub created_at: DateTime<Utc>,
	pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
	pub fn new(
		alert_type: AlertType,
		severity: AlertSeverity,
		message: impl Into<String>,
		details: Value,
		provider_id: Option<String>,
	) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			alert_type,
			severity,
			message: message.into(),
			details,
			provider_id,
			is_resolved: false,
			created_at: Utc::now(),
			resolved_at: None,
		}
	}

	pub fn resolve(&mut self) {
		if !self.is_resolved {
			self.is_resolved = true;
			self.resolved_at = Some(Utc::now());
		}
	}
}

/// Monitoring summary for a single provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderStats {
	pub provider_id: String,
	pub is_monitored: bool,
	pub total_checks: usize,
	pub healthy_checks: usize,
	pub performance_samples: usize,
	pub last_check: Option<HealthCheck>,
	pub reputation: ReputationScore,
	pub open_alerts: usize,
}

/// Aggregate liveness of the quality monitor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorHealth {
	pub healthy: bool,
	pub registered_providers: usize,
	pub running_tasks: usize,
	pub unhealthy_providers: Vec<String>,
	pub open_alerts: usize,
}
