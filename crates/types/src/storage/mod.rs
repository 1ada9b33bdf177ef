//! Storage-related types and traits

pub mod errors;
pub mod traits;

pub use errors::StorageError;
pub use traits::{BudgetService, ProviderCatalog, RequestStore};

pub type StorageResult<T> = Result<T, StorageError>;
