//! Rule evaluation
//!
//! - `evaluator`: pure per-rule evaluation
//! - `engine`: batches, rule sets, active-rule selection and actions
//! - `registry`: snapshot catalog of rules and rule sets

pub mod engine;
pub mod evaluator;
pub mod registry;

pub use engine::{EvaluationOptions, RuleBatchResult, RuleLogEntry, RulesEngine};
pub use evaluator::{EvaluationError, RuleEvaluation, RuleEvaluator};
pub use registry::{RuleCatalog, RuleRegistry};
