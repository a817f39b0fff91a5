//! Ratewire Parser - text to AST for the Ratewire rating interpreter
//!
//! This crate provides:
//! - `ExpressionParser`: the restricted formula language used by mappings,
//!   custom functions and computed rule actions
//! - `DocumentParser`: YAML/JSON artifact documents (`rule:`, `rule_set:`,
//!   `mapping:`, `pipeline:` envelopes)

pub mod document;
pub mod error;
pub mod expression;

// Re-export main parser types
pub use document::{Artifact, DocumentFormat, DocumentParser};
pub use error::{ParseError, Result};
pub use expression::ExpressionParser;
