//! Runtime error types

use crate::adapter::AdapterError;
use ratewire_core::CoreError;
use ratewire_parser::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable error codes reported in evaluation results and step traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RuleNotFound,
    RuleSetNotFound,
    EvaluationError,
    RequiredFieldMissing,
    TransformationError,
    UnexpectedError,
    RoutingFailed,
    PipelineNotFound,
    MappingNotFound,
    ValidationFailed,
    SystemCallFailed,
    Cancelled,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RuleNotFound => "RULE_NOT_FOUND",
            ErrorCode::RuleSetNotFound => "RULE_SET_NOT_FOUND",
            ErrorCode::EvaluationError => "EVALUATION_ERROR",
            ErrorCode::RequiredFieldMissing => "REQUIRED_FIELD_MISSING",
            ErrorCode::TransformationError => "TRANSFORMATION_ERROR",
            ErrorCode::UnexpectedError => "UNEXPECTED_ERROR",
            ErrorCode::RoutingFailed => "ROUTING_FAILED",
            ErrorCode::PipelineNotFound => "PIPELINE_NOT_FOUND",
            ErrorCode::MappingNotFound => "MAPPING_NOT_FOUND",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::SystemCallFailed => "SYSTEM_CALL_FAILED",
            ErrorCode::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Function not in the whitelist and not defined by the configuration
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Expression nesting or call recursion too deep
    #[error("Evaluation depth limit of {0} exceeded")]
    DepthExceeded(usize),

    /// Embedded expression failed to parse
    #[error("Expression error: {0}")]
    Expression(#[from] ParseError),

    #[error("Path error: {0}")]
    Path(#[from] CoreError),

    #[error("Transformation failed: {0}")]
    Transformation(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Rule set not found: {0}")]
    RuleSetNotFound(String),

    #[error("Mapping not found: {0}")]
    MappingNotFound(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("No pipeline routes {0}")]
    RoutingFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("System call failed: {0}")]
    SystemCall(#[from] AdapterError),
}

impl RuntimeError {
    /// Map the error onto the reported code taxonomy
    pub fn code(&self) -> ErrorCode {
        match self {
            RuntimeError::TypeError(_)
            | RuntimeError::InvalidOperation(_)
            | RuntimeError::DivisionByZero
            | RuntimeError::UnknownFunction(_)
            | RuntimeError::DepthExceeded(_)
            | RuntimeError::Expression(_) => ErrorCode::EvaluationError,
            RuntimeError::Path(CoreError::PathConflict { .. }) => ErrorCode::UnexpectedError,
            RuntimeError::Path(_) => ErrorCode::EvaluationError,
            RuntimeError::Transformation(_) => ErrorCode::TransformationError,
            RuntimeError::RuleNotFound(_) => ErrorCode::RuleNotFound,
            RuntimeError::RuleSetNotFound(_) => ErrorCode::RuleSetNotFound,
            RuntimeError::MappingNotFound(_) => ErrorCode::MappingNotFound,
            RuntimeError::PipelineNotFound(_) => ErrorCode::PipelineNotFound,
            RuntimeError::RoutingFailed(_) => ErrorCode::RoutingFailed,
            RuntimeError::ValidationFailed(_) => ErrorCode::ValidationFailed,
            RuntimeError::SystemCall(AdapterError::Cancelled) => ErrorCode::Cancelled,
            RuntimeError::SystemCall(_) => ErrorCode::SystemCallFailed,
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_serialize_screaming() {
        let json = serde_json::to_string(&ErrorCode::RuleSetNotFound).unwrap();
        assert_eq!(json, "\"RULE_SET_NOT_FOUND\"");
        assert_eq!(ErrorCode::RuleSetNotFound.as_str(), "RULE_SET_NOT_FOUND");
    }

    #[test]
    fn test_runtime_error_codes() {
        assert_eq!(RuntimeError::DivisionByZero.code(), ErrorCode::EvaluationError);
        assert_eq!(
            RuntimeError::RoutingFailed("auto/acme/quote".into()).code(),
            ErrorCode::RoutingFailed
        );
        assert_eq!(
            RuntimeError::SystemCall(AdapterError::Cancelled).code(),
            ErrorCode::Cancelled
        );
        assert_eq!(
            RuntimeError::Path(CoreError::PathConflict {
                path: "$.a".into(),
                message: "scalar".into()
            })
            .code(),
            ErrorCode::UnexpectedError
        );
    }
}
