//! Ratewire SDK
//!
//! High-level API over the Ratewire runtime: a [`RatingEngine`] built from
//! a repository of rules, rule sets, mappings and pipelines, with reload.

pub mod builder;
pub mod config;
pub mod error;
pub mod rating_engine;

// Re-export main types
pub use builder::RatingEngineBuilder;
pub use config::EngineConfig;
pub use error::{Result, SdkError};
pub use rating_engine::{RatingEngine, RejectedArtifact, ReloadReport};

// Re-export commonly used types from dependencies
pub use ratewire_core::ast::{Direction, MappingKey, RetryPolicy};
pub use ratewire_core::Value;
pub use ratewire_repository::{
    FileSystemRepository, LoadIssue, MemoryRepository, Repository, RepositoryContent,
};
pub use ratewire_runtime::{
    CancellationToken, ErrorCode, EvaluationOptions, MappingResult, MetricsSnapshot,
    PipelineRequest, PipelineRun, RuleBatchResult, StepStatus, SystemAdapter, SystemEndpoint,
};
