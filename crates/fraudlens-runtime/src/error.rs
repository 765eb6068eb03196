//! Runtime error types

use fraudlens_repository::RepositoryError;
use thiserror::Error;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Field not found
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Invalid value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Rule failed validation
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rule persistence failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// History or assessment store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// External service call failed
    #[error("External call failed: {0}")]
    ExternalCallFailed(String),

    /// Operation exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Generic runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
