//! SDK error types

use ratewire_runtime::ErrorCode;
use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Parser error
    #[error("Parser error: {0}")]
    ParseError(#[from] ratewire_parser::ParseError),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(#[from] ratewire_runtime::RuntimeError),

    /// Repository error
    #[error("Repository error: {0}")]
    RepositoryError(#[from] ratewire_repository::RepositoryError),

    /// Artifact rejected by a registry
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(#[from] ratewire_core::CoreError),
}

impl SdkError {
    /// Taxonomy code when the error comes from evaluation
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            SdkError::RuntimeError(e) => Some(e.code()),
            _ => None,
        }
    }
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ratewire_runtime::RuntimeError;

    #[test]
    fn test_config_error() {
        let error = SdkError::ConfigError("Invalid configuration".to_string());
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("Invalid configuration"));
        assert_eq!(error.code(), None);
    }

    #[test]
    fn test_runtime_error_keeps_code() {
        let error: SdkError = RuntimeError::MappingNotFound("acme_inbound".to_string()).into();
        assert_eq!(error.code(), Some(ErrorCode::MappingNotFound));
        assert!(error.to_string().contains("acme_inbound"));
    }
}
