//! Abstract Syntax Tree (AST) definitions for Ratewire
//!
//! This module contains the definitions for:
//! - Expressions (restricted formula language)
//! - Rules and rule sets
//! - Mapping configurations
//! - Pipelines and routing rules

pub mod expression;
pub mod mapping;
pub mod operator;
pub mod pipeline;
pub mod rule;
pub mod ruleset;

pub use expression::{Expression, UnaryOperator};
pub use mapping::{
    CustomFunction, Direction, FieldMapping, FormatKind, LookupTable, MappingConfiguration,
    MappingKey, Transformation, ValidatorSpec,
};
pub use operator::Operator;
pub use pipeline::{
    Backoff, CallSystemStep, HttpMethod, MapStep, Pipeline, PipelineStep, RetryPolicy,
    RoutingRule, RulesStep, StepKind, ValidateStep,
};
pub use rule::{
    ActionType, CellMatcher, ColumnType, ConditionOperator, ConditionalRule, DecisionColumn,
    DecisionRow, DecisionTableRule, LookupRule, Rule, RuleAction, RuleCondition, RuleKind,
    RuleStatus,
};
pub use ruleset::RuleSet;
