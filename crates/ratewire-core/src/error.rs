//! Error types for Ratewire Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("Path conflict at '{path}': {message}")]
    PathConflict { path: String, message: String },

    #[error("Invalid {kind} '{id}': {message}")]
    InvalidDefinition {
        kind: &'static str,
        id: String,
        message: String,
    },
}

impl CoreError {
    pub(crate) fn invalid_definition(
        kind: &'static str,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CoreError::InvalidDefinition {
            kind,
            id: id.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
