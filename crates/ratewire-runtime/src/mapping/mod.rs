//! Field mapping
//!
//! - `transformer`: per-field transformation
//! - `format`: the `format` transformation kinds
//! - `validators`: non-fatal value checks
//! - `executor`: applies a whole configuration to a source document
//! - `registry`: mapping configurations by id and by system key

pub mod executor;
pub mod format;
pub mod registry;
pub mod transformer;
pub mod validators;

pub use executor::{MappingExecutor, MappingMetadata, MappingResult};
pub use registry::{MappingCatalog, MappingRegistry};
pub use transformer::{FieldTransformer, TransformContext};

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field-scoped mapping error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// Target path of the failing field mapping
    pub field: String,
    pub code: ErrorCode,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.field, self.code, self.message)
    }
}

/// Warning codes produced by the executor and validators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    FieldSkipped,
    ValueRequired,
    MinValue,
    MaxValue,
    MinLength,
    MaxLength,
    PatternMismatch,
    InvalidEmail,
    InvalidDate,
    NotNumeric,
    NotAllowed,
    UnknownValidator,
    InvalidPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWarning {
    pub field: String,
    pub code: WarningCode,
    pub message: String,
}

impl FieldWarning {
    pub fn new(field: &str, code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code,
            message: message.into(),
        }
    }
}
