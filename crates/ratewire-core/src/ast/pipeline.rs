//! Pipeline AST definitions
//!
//! A pipeline is an ordered list of steps plus the routing rules that select
//! it for an inbound request:
//!
//! ```yaml
//! pipeline:
//!   id: acme_auto_quote
//!   product_line: auto
//!   source_system: acme
//!   target_system: ratebook
//!   routing_rules:
//!     - { product_line: auto, source_system: acme, transaction_type: quote, priority: 10 }
//!   steps:
//!     - { order: 1, type: validate, required_fields: [policy.state] }
//!     - { order: 2, type: map_request }
//!     - { order: 3, type: apply_rules, rule_set: auto_ca_rating }
//!     - { order: 4, type: call_system, system: ratebook, path: /rate, retry: { max_retries: 2 } }
//!     - { order: 5, type: map_response }
//! ```

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_line: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_system: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub steps: Vec<PipelineStep>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_rules: Vec<RoutingRule>,
}

fn default_enabled() -> bool {
    true
}

impl Pipeline {
    /// Steps sorted by `order`
    pub fn ordered_steps(&self) -> Vec<&PipelineStep> {
        let mut steps: Vec<&PipelineStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }

    /// A pipeline needs at least one step and contiguous, unique step orders
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| CoreError::invalid_definition("pipeline", &self.id, message);

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("pipeline must declare at least one step".to_string()));
        }

        let mut orders: Vec<u32> = self.steps.iter().map(|s| s.order).collect();
        orders.sort_unstable();
        for pair in orders.windows(2) {
            if pair[0] == pair[1] {
                return Err(invalid(format!("step order {} is declared twice", pair[0])));
            }
            if pair[1] != pair[0] + 1 {
                return Err(invalid(format!(
                    "step orders are not contiguous: {} is followed by {}",
                    pair[0], pair[1]
                )));
            }
        }

        for step in &self.steps {
            if let StepKind::CallSystem(call) = &step.kind {
                if call.system.trim().is_empty() {
                    return Err(invalid(format!("step {} calls no system", step.order)));
                }
            }
        }

        Ok(())
    }
}

/// One step of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub order: u32,

    /// Display name; defaults to the step kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(flatten)]
    pub kind: StepKind,
}

impl PipelineStep {
    pub fn new(order: u32, kind: StepKind) -> Self {
        Self {
            order,
            name: None,
            enabled: true,
            kind,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.kind.type_name())
    }
}

/// Step kinds; unrecognized kinds deserialize to `Unknown` and are no-ops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Validate(ValidateStep),
    MapRequest(MapStep),
    ApplyRules(RulesStep),
    CallSystem(CallSystemStep),
    MapResponse(MapStep),
    ApplyResponseRules(RulesStep),
    #[serde(other)]
    Unknown,
}

impl StepKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Validate(_) => "validate",
            StepKind::MapRequest(_) => "map_request",
            StepKind::ApplyRules(_) => "apply_rules",
            StepKind::CallSystem(_) => "call_system",
            StepKind::MapResponse(_) => "map_response",
            StepKind::ApplyResponseRules(_) => "apply_response_rules",
            StepKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidateStep {
    /// Paths that must be present and non-null in the request document
    #[serde(default)]
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MapStep {
    /// Explicit mapping; resolved by system/product/direction when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<String>,

    /// Continue with the partial document when some fields fail
    #[serde(default)]
    pub allow_partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RulesStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_ids: Vec<String>,

    /// Evaluate every active rule in the pipeline's scope
    #[serde(default)]
    pub active_rules: bool,

    #[serde(default)]
    pub stop_on_first_match: bool,

    #[serde(default)]
    pub aggregate_results: bool,

    /// Fail the step when any rule evaluation carries an error
    #[serde(default)]
    pub fail_on_error: bool,

    /// Fact path holding the state used for active-rule scoping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSystemStep {
    /// Name of the configured external system
    pub system: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Attach the accumulated rule results to the request body under this key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_results_field: Option<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

/// Bounded retry with exponential or fixed backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: Backoff,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: Backoff::default(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `max_delay_ms`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let millis = match self.backoff {
            Backoff::Fixed => self.initial_delay_ms,
            Backoff::Exponential => {
                let factor = 2u64.saturating_pow(retry.saturating_sub(1));
                self.initial_delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(millis.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    #[default]
    Exponential,
    Fixed,
}

/// Matcher selecting a pipeline for an inbound request; unset fields match anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoutingRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_line: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,

    #[serde(default)]
    pub priority: i32,
}

impl RoutingRule {
    pub fn matches(
        &self,
        product_line: Option<&str>,
        source_system: Option<&str>,
        transaction_type: Option<&str>,
    ) -> bool {
        fn field(rule: &Option<String>, wanted: Option<&str>) -> bool {
            match (rule, wanted) {
                (None, _) => true,
                (Some(rule), Some(wanted)) => rule.eq_ignore_ascii_case(wanted),
                (Some(_), None) => false,
            }
        }

        field(&self.product_line, product_line)
            && field(&self.source_system, source_system)
            && field(&self.transaction_type, transaction_type)
    }
}
