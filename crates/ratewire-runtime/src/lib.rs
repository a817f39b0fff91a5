//! Ratewire Runtime - interpreter for rating rules, field mappings and pipelines
//!
//! This crate evaluates the artifacts defined in `ratewire-core` against
//! request-scoped data:
//! - `rules`: rule evaluator, rules engine with a shared result accumulator
//! - `mapping`: field transformer and mapping executor
//! - `pipeline`: routing and step orchestration
//! - `adapter`: external system calls with timeout, retry and cancellation
//!
//! Everything except `call_system` is synchronous. Registries are snapshot
//! cells injected into the engines that read them.

pub mod adapter;
pub mod error;
pub mod expression;
pub mod mapping;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod rules;

// Re-export main types
pub use adapter::{
    call_with_retry, AdapterError, HttpSystemAdapter, RetryOutcome, SystemAdapter, SystemEndpoint,
    SystemRequest, SystemResponse,
};
pub use error::{ErrorCode, Result, RuntimeError};
pub use expression::{ExpressionEvaluator, Scope};
pub use mapping::{
    FieldError, FieldTransformer, FieldWarning, MappingCatalog, MappingExecutor, MappingMetadata,
    MappingRegistry, MappingResult, TransformContext, WarningCode,
};
pub use observability::{
    Counter, Histogram, HistogramSummary, Metrics, MetricsCollector, MetricsSnapshot,
};
pub use pipeline::{
    route, PipelineCatalog, PipelineOrchestrator, PipelineRegistry, PipelineRequest, PipelineRun,
    StepError, StepStatus, StepTrace,
};
pub use registry::SnapshotCell;
pub use rules::{
    EvaluationError, EvaluationOptions, RuleBatchResult, RuleCatalog, RuleEvaluation,
    RuleEvaluator, RuleLogEntry, RuleRegistry, RulesEngine,
};
pub use tokio_util::sync::CancellationToken;
