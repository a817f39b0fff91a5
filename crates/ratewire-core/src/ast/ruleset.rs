//! Rule set AST definitions

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// A named, ordered group of rules evaluated together
///
/// ```yaml
/// rule_set:
///   id: auto_ca_rating
///   name: Auto CA rating
///   rules: [state_tax, experience_mod, high_limit_surcharge]
///   sort_by_priority: true
///   stop_on_first_match: false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Rule ids in evaluation order
    pub rules: Vec<String>,

    /// Re-sort the rules by priority (descending) before evaluation
    #[serde(default)]
    pub sort_by_priority: bool,

    #[serde(default)]
    pub stop_on_first_match: bool,

    #[serde(default)]
    pub aggregate_results: bool,
}

impl RuleSet {
    pub fn new(id: impl Into<String>, rules: Vec<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            rules,
            sort_by_priority: false,
            stop_on_first_match: false,
            aggregate_results: false,
        }
    }

    pub fn with_sort_by_priority(mut self, sort: bool) -> Self {
        self.sort_by_priority = sort;
        self
    }

    pub fn with_stop_on_first_match(mut self, stop: bool) -> Self {
        self.stop_on_first_match = stop;
        self
    }

    pub fn with_aggregate_results(mut self, aggregate: bool) -> Self {
        self.aggregate_results = aggregate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::invalid_definition(
                "rule set",
                &self.id,
                "id must not be empty",
            ));
        }
        if let Some(empty) = self.rules.iter().position(|r| r.trim().is_empty()) {
            return Err(CoreError::invalid_definition(
                "rule set",
                &self.id,
                format!("rule reference {} is empty", empty),
            ));
        }
        Ok(())
    }
}
