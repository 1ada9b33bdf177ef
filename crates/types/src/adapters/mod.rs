//! Adapter contracts for provider execution and health probing

pub mod errors;
pub mod traits;

pub use errors::AdapterError;
pub use traits::{HealthProbe, ServiceExecutor};

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;
