//! Service request domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::providers::ServiceType;

/// Caller-assigned urgency of a request
#[derive(
	Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Low,
	#[default]
	Medium,
	High,
	Critical,
}

impl Priority {
	/// Integer weight used by the payment queue
	pub fn weight(&self) -> u32 {
		match self {
			Priority::Critical => 10,
			Priority::High => 7,
			Priority::Medium => 5,
			Priority::Low => 1,
		}
	}
}

/// Lifecycle of a service request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
	Pending,
	Processing,
	Completed,
	Failed,
	Cancelled,
}

impl RequestStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
		)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			RequestStatus::Pending => "pending",
			RequestStatus::Processing => "processing",
			RequestStatus::Completed => "completed",
			RequestStatus::Failed => "failed",
			RequestStatus::Cancelled => "cancelled",
		}
	}
}

/// A unit of paid work submitted by a user
///
/// Created by the caller; only the payment scheduler mutates its status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRequest {
	pub id: String,
	pub service_type: ServiceType,
	#[serde(default)]
	pub parameters: Value,
	pub estimated_cost: f64,
	pub max_budget: f64,
	#[serde(default)]
	pub priority: Priority,
	pub user_id: String,
	pub status: RequestStatus,
	pub response_data: Option<Value>,
	pub error: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
	pub fn new(
		id: impl Into<String>,
		user_id: impl Into<String>,
		service_type: ServiceType,
		max_budget: f64,
	) -> Self {
		let now = Utc::now();
		Self {
			id: id.into(),
			service_type,
			parameters: Value::Object(Default::default()),
			estimated_cost: 0.0,
			max_budget,
			priority: Priority::default(),
			user_id: user_id.into(),
			status: RequestStatus::Pending,
			response_data: None,
			error: None,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn with_priority(mut self, priority: Priority) -> Self {
		self.priority = priority;
		self
	}

	pub fn with_estimated_cost(mut self, estimated_cost: f64) -> Self {
		self.estimated_cost = estimated_cost;
		self
	}

	pub fn with_parameters(mut self, parameters: Value) -> Self {
		self.parameters = parameters;
		self
	}

	/// Numeric request parameter, if present
	pub fn numeric_parameter(&self, key: &str) -> Option<f64> {
		self.parameters
			.get(key)
			.and_then(Value::as_f64)
			.filter(|value| value.is_finite() && *value >= 0.0)
	}

	/// Apply a status transition with optional payload/error
	pub fn apply_status(
		&mut self,
		status: RequestStatus,
		response_data: Option<Value>,
		error: Option<String>,
	) {
		self.status = status;
		if response_data.is_some() {
			self.response_data = response_data;
		}
		match status {
			RequestStatus::Completed => self.error = None,
			_ => {
				if error.is_some() {
					self.error = error;
				}
			},
		}
		self.updated_at = Utc::now();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_priority_weights() {
		assert_eq!(Priority::Critical.weight(), 10);
		assert_eq!(Priority::High.weight(), 7);
		assert_eq!(Priority::Medium.weight(), 5);
		assert_eq!(Priority::Low.weight(), 1);
	}

	#[test]
	fn test_numeric_parameter() {
		let request = ServiceRequest::new("r1", "u1", ServiceType::Storage, 1.0)
			.with_parameters(json!({"payload_kb": 12.5, "label": "x", "bad": -3}));

		assert_eq!(request.numeric_parameter("payload_kb"), Some(12.5));
		assert_eq!(request.numeric_parameter("label"), None);
		assert_eq!(request.numeric_parameter("bad"), None);
		assert_eq!(request.numeric_parameter("missing"), None);
	}

	#[test]
	fn test_completion_clears_previous_error() {
		let mut request = ServiceRequest::new("r1", "u1", ServiceType::Weather, 1.0);
		request.apply_status(RequestStatus::Failed, None, Some("boom".to_string()));
		assert_eq!(request.error.as_deref(), Some("boom"));

		request.apply_status(RequestStatus::Completed, Some(json!({"ok": true})), None);
		assert_eq!(request.status, RequestStatus::Completed);
		assert!(request.error.is_none());
		assert!(request.status.is_terminal());
	}
}
