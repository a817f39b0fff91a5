//! Ratewire Core - Core types and definitions for the Ratewire rating interpreter
//!
//! This crate provides the fundamental types used across the Ratewire workspace:
//! - Value types for fact bags and documents
//! - Field paths (`$.a.b[0]` and dotted access)
//! - AST definitions for rules, rule sets, mappings, pipelines and expressions
//! - Error types

pub mod ast;
pub mod error;
pub mod path;
pub mod types;

// Re-export commonly used types
pub use error::CoreError;
pub use path::{FieldPath, PathSegment};
pub use types::Value;
