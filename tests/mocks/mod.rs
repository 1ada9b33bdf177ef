//! Centralized mocks and fixtures for testing
//!
//! Reusable providers, requests, settings, executors and probes shared by
//! the integration suites.

pub mod configs;
pub mod entities;
pub mod executors;
pub mod probes;

// Re-export commonly used items for convenience
#[allow(unused_imports)]
pub use configs::MockConfigs;
#[allow(unused_imports)]
pub use entities::MockEntities;
#[allow(unused_imports)]
pub use executors::ScriptedExecutor;
#[allow(unused_imports)]
pub use probes::ScriptedProbe;
