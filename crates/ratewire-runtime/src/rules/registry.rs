//! Rule registry
//!
//! Rules and rule sets keyed by id, held in a snapshot cell. Every write
//! validates the incoming definition and swaps in a new catalog.

use crate::registry::SnapshotCell;
use ratewire_core::ast::{Rule, RuleSet};
use ratewire_core::CoreError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable view of the registered rules and rule sets
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: BTreeMap<String, Arc<Rule>>,
    rule_sets: BTreeMap<String, Arc<RuleSet>>,
}

impl RuleCatalog {
    pub fn rule(&self, id: &str) -> Option<&Arc<Rule>> {
        self.rules.get(id)
    }

    pub fn rule_set(&self, id: &str) -> Option<&Arc<RuleSet>> {
        self.rule_sets.get(id)
    }

    /// Rules ordered by id
    pub fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values()
    }

    pub fn rule_sets(&self) -> impl Iterator<Item = &Arc<RuleSet>> {
        self.rule_sets.values()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rule_set_count(&self) -> usize {
        self.rule_sets.len()
    }
}

/// Shared handle to the rule catalog
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    catalog: Arc<SnapshotCell<RuleCatalog>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current catalog snapshot
    pub fn snapshot(&self) -> Arc<RuleCatalog> {
        self.catalog.load()
    }

    pub fn get_rule(&self, id: &str) -> Option<Arc<Rule>> {
        self.snapshot().rule(id).cloned()
    }

    pub fn get_rule_set(&self, id: &str) -> Option<Arc<RuleSet>> {
        self.snapshot().rule_set(id).cloned()
    }

    /// Register or replace a rule
    pub fn register_rule(&self, rule: Rule) -> Result<(), CoreError> {
        rule.validate()?;
        tracing::debug!(rule_id = %rule.id, rule_type = rule.kind.type_name(), "Registering rule");
        self.catalog.update(|current| {
            let mut next = current.clone();
            next.rules.insert(rule.id.clone(), Arc::new(rule));
            (next, ())
        });
        Ok(())
    }

    /// Register or replace a rule set
    pub fn register_rule_set(&self, rule_set: RuleSet) -> Result<(), CoreError> {
        rule_set.validate()?;
        self.catalog.update(|current| {
            let mut next = current.clone();
            next.rule_sets
                .insert(rule_set.id.clone(), Arc::new(rule_set));
            (next, ())
        });
        Ok(())
    }

    pub fn remove_rule(&self, id: &str) -> bool {
        self.catalog.update(|current| {
            let mut next = current.clone();
            let removed = next.rules.remove(id).is_some();
            (next, removed)
        })
    }

    /// Replace the whole catalog.
    ///
    /// Invalid definitions are rejected individually and returned; the rest
    /// are installed in one swap.
    pub fn replace_all(&self, rules: Vec<Rule>, rule_sets: Vec<RuleSet>) -> Vec<CoreError> {
        let mut rejected = Vec::new();
        let mut catalog = RuleCatalog::default();

        for rule in rules {
            match rule.validate() {
                Ok(()) => {
                    if catalog.rules.contains_key(&rule.id) {
                        tracing::warn!(rule_id = %rule.id, "Duplicate rule id, keeping the last definition");
                    }
                    catalog.rules.insert(rule.id.clone(), Arc::new(rule));
                }
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, error = %e, "Rejecting rule");
                    rejected.push(e);
                }
            }
        }

        for rule_set in rule_sets {
            match rule_set.validate() {
                Ok(()) => {
                    catalog
                        .rule_sets
                        .insert(rule_set.id.clone(), Arc::new(rule_set));
                }
                Err(e) => {
                    tracing::warn!(rule_set_id = %rule_set.id, error = %e, "Rejecting rule set");
                    rejected.push(e);
                }
            }
        }

        tracing::info!(
            rules = catalog.rule_count(),
            rule_sets = catalog.rule_set_count(),
            rejected = rejected.len(),
            "Rule catalog replaced"
        );
        self.catalog.store(catalog);
        rejected
    }
}
