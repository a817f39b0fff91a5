//! Parser error types

use ratewire_core::CoreError;
use thiserror::Error;

/// Parser error
#[derive(Error, Debug)]
pub enum ParseError {
    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid expression syntax
    #[error("Invalid expression syntax: {0}")]
    InvalidExpression(String),

    /// Unexpected token while parsing an expression
    #[error("Unexpected {found} at position {position}, expected {expected}")]
    UnexpectedToken {
        position: usize,
        found: String,
        expected: String,
    },

    /// Expression nests deeper than the parser allows
    #[error("Expression exceeds maximum nesting depth of {0}")]
    TooDeep(usize),

    /// Document is not wrapped in a known envelope
    #[error("Unknown document envelope: {0}")]
    UnknownEnvelope(String),

    /// Artifact parsed but violates an invariant
    #[error("Invalid definition: {0}")]
    InvalidDefinition(#[from] CoreError),
}

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;
