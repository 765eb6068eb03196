//! SDK error types

use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(#[from] fraudlens_runtime::RuntimeError),

    /// Rule repository error
    #[error("Repository error: {0}")]
    RepositoryError(#[from] fraudlens_repository::RepositoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Transaction rejected before analysis
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Generic SDK error
    #[error("SDK error: {0}")]
    GenericError(String),
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlens_runtime::RuntimeError;

    #[test]
    fn test_config_error() {
        let error = SdkError::ConfigError("levels must increase".to_string());
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("levels must increase"));
    }

    #[test]
    fn test_runtime_error_conversion() {
        let error: SdkError = RuntimeError::InvalidConfig("bad window".to_string()).into();
        assert!(matches!(error, SdkError::RuntimeError(_)));
        assert!(error.to_string().contains("bad window"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "fraudlens.yaml");
        let sdk_error: SdkError = io_error.into();
        assert!(sdk_error.to_string().contains("I/O error"));
        assert!(sdk_error.to_string().contains("fraudlens.yaml"));
    }

    #[test]
    fn test_invalid_transaction() {
        let error = SdkError::InvalidTransaction("negative amount".to_string());
        assert_eq!(error.to_string(), "Invalid transaction: negative amount");
    }
}
