//! Rules engine
//!
//! Evaluates batches of rules against one fact bag and a request-scoped
//! result accumulator. Actions of each rule are applied to the accumulator
//! before the next rule is evaluated, so later rules (and their expressions)
//! see what earlier rules produced.

use crate::error::{ErrorCode, Result, RuntimeError};
use crate::expression::{ExpressionEvaluator, Scope};
use crate::observability::Metrics;
use crate::rules::evaluator::{EvaluationError, RuleEvaluation, RuleEvaluator};
use crate::rules::registry::RuleRegistry;
use chrono::NaiveDate;
use ratewire_core::ast::{ActionType, Rule, RuleAction, RuleKind, RuleStatus};
use ratewire_core::{FieldPath, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Batch policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOptions {
    #[serde(default)]
    pub stop_on_first_match: bool,

    #[serde(default)]
    pub aggregate_results: bool,
}

/// Message recorded by a `log` action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLogEntry {
    pub rule_id: String,
    pub message: String,
}

/// Result of evaluating a batch of rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBatchResult {
    pub evaluations: Vec<RuleEvaluation>,

    /// Accumulated results after every action was applied
    pub results: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<RuleLogEntry>,

    /// Whether `evaluations` was collapsed by `aggregate_results`
    #[serde(default)]
    pub aggregated: bool,
}

impl RuleBatchResult {
    pub fn matched(&self) -> impl Iterator<Item = &RuleEvaluation> {
        self.evaluations.iter().filter(|e| e.matched)
    }

    pub fn errors(&self) -> impl Iterator<Item = &RuleEvaluation> {
        self.evaluations.iter().filter(|e| e.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Rules engine
#[derive(Clone)]
pub struct RulesEngine {
    registry: RuleRegistry,
    evaluator: RuleEvaluator,
    metrics: Option<Arc<dyn Metrics>>,
}

impl RulesEngine {
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry,
            evaluator: RuleEvaluator::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Evaluate a single rule; its actions are applied to a fresh accumulator
    pub fn evaluate_rule(&self, rule_id: &str, facts: &Value) -> RuleBatchResult {
        self.evaluate_rules(&[rule_id.to_string()], facts, EvaluationOptions::default())
    }

    /// Evaluate rules in the given order
    pub fn evaluate_rules(
        &self,
        rule_ids: &[String],
        facts: &Value,
        options: EvaluationOptions,
    ) -> RuleBatchResult {
        let catalog = self.registry.snapshot();
        let batch: Vec<(&str, Option<&Rule>)> = rule_ids
            .iter()
            .map(|id| (id.as_str(), catalog.rule(id).map(|r| r.as_ref())))
            .collect();
        self.run_batch(&batch, facts, options)
    }

    /// Evaluate a registered rule set with its own policies
    pub fn evaluate_rule_set(&self, rule_set_id: &str, facts: &Value) -> Result<RuleBatchResult> {
        let catalog = self.registry.snapshot();
        let rule_set = catalog
            .rule_set(rule_set_id)
            .ok_or_else(|| RuntimeError::RuleSetNotFound(rule_set_id.to_string()))?;

        let mut batch: Vec<(&str, Option<&Rule>)> = rule_set
            .rules
            .iter()
            .map(|id| (id.as_str(), catalog.rule(id).map(|r| r.as_ref())))
            .collect();

        if rule_set.sort_by_priority {
            // Stable: equal priorities keep their declared order, unknown ids go last
            batch.sort_by_key(|(_, rule)| match rule {
                Some(rule) => (0, std::cmp::Reverse(rule.priority)),
                None => (1, std::cmp::Reverse(0)),
            });
        }

        tracing::debug!(rule_set_id, rules = batch.len(), "Evaluating rule set");

        let options = EvaluationOptions {
            stop_on_first_match: rule_set.stop_on_first_match,
            aggregate_results: rule_set.aggregate_results,
        };
        Ok(self.run_batch(&batch, facts, options))
    }

    /// Evaluate every active rule in scope as of today
    pub fn evaluate_active_rules(
        &self,
        facts: &Value,
        product_line: Option<&str>,
        state: Option<&str>,
    ) -> RuleBatchResult {
        let today = chrono::Utc::now().date_naive();
        self.evaluate_active_rules_at(facts, product_line, state, today)
    }

    /// Evaluate every active rule in scope as of `as_of`.
    ///
    /// Rules run by priority descending, ties broken by id.
    pub fn evaluate_active_rules_at(
        &self,
        facts: &Value,
        product_line: Option<&str>,
        state: Option<&str>,
        as_of: NaiveDate,
    ) -> RuleBatchResult {
        let catalog = self.registry.snapshot();
        let mut active: Vec<&Rule> = catalog
            .rules()
            .map(|r| r.as_ref())
            .filter(|rule| {
                rule.status == RuleStatus::Active
                    && rule.matches_scope(product_line, state)
                    && rule.is_effective_on(as_of)
            })
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        tracing::debug!(
            product_line = product_line.unwrap_or("*"),
            state = state.unwrap_or("*"),
            %as_of,
            rules = active.len(),
            "Evaluating active rules"
        );

        let batch: Vec<(&str, Option<&Rule>)> =
            active.into_iter().map(|r| (r.id.as_str(), Some(r))).collect();
        self.run_batch(&batch, facts, EvaluationOptions::default())
    }

    fn run_batch(
        &self,
        batch: &[(&str, Option<&Rule>)],
        facts: &Value,
        options: EvaluationOptions,
    ) -> RuleBatchResult {
        let start = Instant::now();
        let mut results = Value::object();
        let mut logs = Vec::new();
        let mut evaluations = Vec::with_capacity(batch.len());

        for (rule_id, rule) in batch {
            let evaluation = match rule {
                Some(rule) => {
                    let mut evaluation = self.evaluator.evaluate(rule, facts);
                    self.accumulate(rule, &mut evaluation, facts, &mut results, &mut logs);
                    evaluation
                }
                None => {
                    tracing::warn!(rule_id, "Rule not found");
                    RuleEvaluation::not_found(rule_id)
                }
            };

            self.record(&evaluation);
            let stop = options.stop_on_first_match && evaluation.matched;
            evaluations.push(evaluation);
            if stop {
                break;
            }
        }

        let results = match results {
            Value::Object(map) => map,
            _ => BTreeMap::new(),
        };

        let evaluations = if options.aggregate_results {
            aggregate(evaluations, &results)
        } else {
            evaluations
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_execution_time("rule_batch", start.elapsed());
        }

        RuleBatchResult {
            evaluations,
            results,
            logs,
            aggregated: options.aggregate_results,
        }
    }

    /// Fold a rule's outcome into the accumulator
    fn accumulate(
        &self,
        rule: &Rule,
        evaluation: &mut RuleEvaluation,
        facts: &Value,
        results: &mut Value,
        logs: &mut Vec<RuleLogEntry>,
    ) {
        if evaluation.is_error() {
            return;
        }

        // Table outcomes are recorded under the rule id
        if !matches!(rule.kind, RuleKind::Conditional(_)) {
            if let (Some(value), Value::Object(map)) = (&evaluation.value, &mut *results) {
                map.insert(rule.id.clone(), value.clone());
            }
            return;
        }

        let Some(actions) = evaluation.actions.clone() else {
            return;
        };

        // Actions commit together; a failing rule leaves no partial effects
        let mut scratch = results.clone();
        let mut rule_logs = Vec::new();
        for action in &actions {
            if let Err(e) = apply_action(&rule.id, action, facts, &mut scratch, &mut rule_logs) {
                tracing::debug!(rule_id = %rule.id, target = %action.target, error = %e, "Action failed");
                evaluation.error = Some(EvaluationError {
                    code: ErrorCode::EvaluationError,
                    message: e.to_string(),
                });
                return;
            }
        }
        *results = scratch;
        logs.append(&mut rule_logs);
    }

    fn record(&self, evaluation: &RuleEvaluation) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.counter("rules_evaluated").inc();
        if evaluation.matched {
            metrics.counter("rules_matched").inc();
        }
        if let Some(error) = &evaluation.error {
            metrics.record_error(error.code.as_str());
        }
    }
}

/// Collapse to the first matched evaluation carrying the accumulated results
fn aggregate(
    evaluations: Vec<RuleEvaluation>,
    results: &BTreeMap<String, Value>,
) -> Vec<RuleEvaluation> {
    match evaluations.into_iter().find(|e| e.matched) {
        Some(mut first) => {
            first.value = Some(Value::Object(results.clone()));
            vec![first]
        }
        None => Vec::new(),
    }
}

fn apply_action(
    rule_id: &str,
    action: &RuleAction,
    facts: &Value,
    results: &mut Value,
    logs: &mut Vec<RuleLogEntry>,
) -> Result<()> {
    let operand = action_operand(action, facts, results)?;

    if action.action_type == ActionType::Log {
        let message = action
            .message
            .clone()
            .unwrap_or_else(|| operand.to_display_string());
        tracing::info!(rule_id, message = %message, "Rule log");
        logs.push(RuleLogEntry {
            rule_id: rule_id.to_string(),
            message,
        });
        return Ok(());
    }

    let path = FieldPath::parse(&action.target)?;
    let current = path.resolve(results).cloned().unwrap_or_default();

    let next = match action.action_type {
        ActionType::Set => operand,
        ActionType::Add => {
            let base = numeric_target(&action.target, &current, 0.0)?;
            Value::Number(base + numeric_operand(action, &operand)?)
        }
        ActionType::Multiply => {
            let base = numeric_target(&action.target, &current, 1.0)?;
            Value::Number(base * numeric_operand(action, &operand)?)
        }
        ActionType::Apply => match current {
            Value::Null => Value::Array(vec![operand]),
            Value::Array(mut items) => {
                items.push(operand);
                Value::Array(items)
            }
            other => {
                return Err(RuntimeError::TypeError(format!(
                    "cannot append to '{}' holding {}",
                    action.target,
                    other.type_name()
                )))
            }
        },
        ActionType::Log => return Ok(()),
    };

    path.set(results, next)?;
    Ok(())
}

/// Literal value, or the expression evaluated over `results` and the facts
fn action_operand(action: &RuleAction, facts: &Value, results: &Value) -> Result<Value> {
    match &action.expression {
        Some(expression) => {
            let mut bindings = BTreeMap::new();
            bindings.insert("results".to_string(), results.clone());
            let bindings = Value::Object(bindings);
            let scope = Scope::new(&bindings).with_fallback(facts);
            ExpressionEvaluator::new().evaluate_str(expression, &scope)
        }
        None => Ok(action.value.clone().unwrap_or_default()),
    }
}

fn numeric_target(target: &str, current: &Value, base: f64) -> Result<f64> {
    if current.is_null() {
        return Ok(base);
    }
    current.to_number().ok_or_else(|| {
        RuntimeError::TypeError(format!(
            "result '{}' holds {} and is not numeric",
            target,
            current.type_name()
        ))
    })
}

fn numeric_operand(action: &RuleAction, operand: &Value) -> Result<f64> {
    operand.to_number().ok_or_else(|| {
        RuntimeError::TypeError(format!(
            "operand for '{}' must be numeric, got {}",
            action.target,
            operand.type_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MetricsCollector;
    use ratewire_core::ast::RuleSet;

    fn rule(yaml: &str) -> Rule {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn facts(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn engine() -> RulesEngine {
        let registry = RuleRegistry::new();
        registry
            .register_rule(rule(
                r#"
id: base_rate
type: conditional
priority: 10
conditions: [{ fact: vehicle.type, operator: equal, value: truck }]
actions:
  - { type: set, target: premium.base, value: 1000 }
  - { type: apply, target: notes, value: commercial }
else_actions:
  - { type: set, target: premium.base, value: 600 }
"#,
            ))
            .unwrap();
        registry
            .register_rule(rule(
                r#"
id: young_driver
type: conditional
priority: 5
conditions: [{ fact: driver.age, operator: lessThan, value: 25 }]
actions:
  - { type: multiply, target: premium.factor, value: 1.5 }
  - { type: set, target: premium.total, expression: "results.premium.base * results.premium.factor" }
  - { type: log, target: "", message: young driver surcharge }
"#,
            ))
            .unwrap();
        registry
            .register_rule(rule(
                "id: state_tax\ntype: lookup\npriority: 1\nkey_field: state\ntable: { CA: 0.05 }\ndefault_value: 0",
            ))
            .unwrap();
        registry
            .register_rule_set(
                RuleSet::new(
                    "auto",
                    vec![
                        "state_tax".to_string(),
                        "missing".to_string(),
                        "young_driver".to_string(),
                        "base_rate".to_string(),
                    ],
                )
                .with_sort_by_priority(true),
            )
            .unwrap();
        RulesEngine::new(registry)
    }

    #[test]
    fn test_actions_accumulate_across_rules() {
        let engine = engine();
        let batch = engine.evaluate_rules(
            &["base_rate".to_string(), "young_driver".to_string()],
            &facts(serde_json::json!({"vehicle": {"type": "truck"}, "driver": {"age": 21}})),
            EvaluationOptions::default(),
        );

        let premium = &batch.results["premium"];
        assert_eq!(premium.get("base"), Some(&Value::Number(1000.0)));
        assert_eq!(premium.get("factor"), Some(&Value::Number(1.5)));
        assert_eq!(premium.get("total"), Some(&Value::Number(1500.0)));
        assert_eq!(batch.results["notes"], Value::Array(vec![Value::from("commercial")]));
        assert_eq!(batch.logs.len(), 1);
        assert_eq!(batch.logs[0].message, "young driver surcharge");
    }

    #[test]
    fn test_unknown_rule_id() {
        let batch = engine().evaluate_rule("nope", &Value::object());
        assert_eq!(batch.evaluations.len(), 1);
        assert_eq!(
            batch.evaluations[0].error.as_ref().unwrap().code,
            ErrorCode::RuleNotFound
        );
    }

    #[test]
    fn test_rule_set_sorted_by_priority_unknown_last() {
        let batch = engine()
            .evaluate_rule_set("auto", &facts(serde_json::json!({"state": "CA", "driver": {"age": 40}})))
            .unwrap();
        let order: Vec<&str> = batch.evaluations.iter().map(|e| e.rule_id.as_str()).collect();
        assert_eq!(order, vec!["base_rate", "young_driver", "state_tax", "missing"]);
        assert_eq!(batch.results["state_tax"], Value::Number(0.05));
        assert_eq!(batch.results["premium"].get("base"), Some(&Value::Number(600.0)));
    }

    #[test]
    fn test_unknown_rule_set() {
        let err = engine().evaluate_rule_set("ghost", &Value::object()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RuleSetNotFound);
    }

    #[test]
    fn test_stop_on_first_match_and_aggregate() {
        let engine = engine();
        let ids = vec!["young_driver".to_string(), "state_tax".to_string(), "base_rate".to_string()];
        let input = facts(serde_json::json!({"state": "CA", "driver": {"age": 19}}));

        let stopped = engine.evaluate_rules(
            &ids,
            &input,
            EvaluationOptions {
                stop_on_first_match: true,
                aggregate_results: false,
            },
        );
        assert_eq!(stopped.evaluations.len(), 1);

        let aggregated = engine.evaluate_rules(
            &ids,
            &input,
            EvaluationOptions {
                stop_on_first_match: false,
                aggregate_results: true,
            },
        );
        assert!(aggregated.aggregated);
        assert_eq!(aggregated.evaluations.len(), 1);
        assert_eq!(aggregated.evaluations[0].rule_id, "young_driver");
        let value = aggregated.evaluations[0].value.as_ref().unwrap();
        assert_eq!(value.get("state_tax"), Some(&Value::Number(0.05)));

        let nothing = engine.evaluate_rules(
            &["young_driver".to_string()],
            &facts(serde_json::json!({"driver": {"age": 60}})),
            EvaluationOptions {
                stop_on_first_match: false,
                aggregate_results: true,
            },
        );
        assert!(nothing.evaluations.is_empty());
    }

    #[test]
    fn test_failing_action_marks_rule() {
        let registry = RuleRegistry::new();
        registry
            .register_rule(rule(
                r#"
id: bad_add
type: conditional
conditions: []
actions:
  - { type: set, target: tier, value: gold }
  - { type: log, target: "", message: tier set }
  - { type: add, target: tier, value: 1 }
  - { type: set, target: after, value: true }
"#,
            ))
            .unwrap();
        registry
            .register_rule(rule(
                "id: discount
type: conditional
conditions: []
actions:
  - { type: set, target: discount, value: 0.1 }",
            ))
            .unwrap();
        let engine = RulesEngine::new(registry);

        let batch = engine.evaluate_rule("bad_add", &Value::object());
        let evaluation = &batch.evaluations[0];
        assert!(evaluation.matched);
        assert_eq!(evaluation.error.as_ref().unwrap().code, ErrorCode::EvaluationError);
        assert!(batch.results.is_empty());
        assert!(batch.logs.is_empty());

        // Earlier rules keep their effects when a later one fails
        let batch = engine.evaluate_rules(
            &["discount".to_string(), "bad_add".to_string()],
            &Value::object(),
            EvaluationOptions::default(),
        );
        assert_eq!(batch.results.get("discount"), Some(&Value::Number(0.1)));
        assert!(batch.results.get("tier").is_none());
        assert!(batch.evaluations[1].is_error());
    }

    #[test]
    fn test_active_rules_scope_window_and_order() {
        let registry = RuleRegistry::new();
        let rules = [
            "id: b\ntype: lookup\npriority: 5\nkey_field: x\ntable: {}",
            "id: a\ntype: lookup\npriority: 5\nkey_field: x\ntable: {}",
            "id: top\ntype: lookup\npriority: 9\nproduct_line: auto\nkey_field: x\ntable: {}",
            "id: home_only\ntype: lookup\nproduct_line: home\nkey_field: x\ntable: {}",
            "id: draft\ntype: lookup\nstatus: draft\nkey_field: x\ntable: {}",
            "id: expired\ntype: lookup\nexpiration_date: 2025-12-31\nkey_field: x\ntable: {}",
            "id: boundary\ntype: lookup\npriority: -1\neffective_date: 2026-03-01\nexpiration_date: 2026-03-01\nkey_field: x\ntable: {}",
        ];
        for yaml in rules {
            registry.register_rule(rule(yaml)).unwrap();
        }
        let as_of = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let batch = RulesEngine::new(registry).evaluate_active_rules_at(
            &Value::object(),
            Some("AUTO"),
            Some("CA"),
            as_of,
        );
        let order: Vec<&str> = batch.evaluations.iter().map(|e| e.rule_id.as_str()).collect();
        assert_eq!(order, vec!["top", "a", "b", "boundary"]);
    }

    #[test]
    fn test_metrics_recorded() {
        let metrics = Arc::new(MetricsCollector::new());
        let engine = engine().with_metrics(metrics.clone());
        engine.evaluate_rule("state_tax", &facts(serde_json::json!({"state": "CA"})));
        engine.evaluate_rule("nope", &Value::object());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.counters["rules_evaluated"], 2);
        assert_eq!(snapshot.counters["rules_matched"], 1);
        assert_eq!(snapshot.counters["errors_RULE_NOT_FOUND"], 1);
    }
}
