//! Storage error types

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Item not found: {id}")]
	NotFound { id: String },
	#[error("Item already exists: {id}")]
	AlreadyExists { id: String },
	#[error("Validation failed: {message}")]
	Validation { message: String },
}
