//! Rule evaluator
//!
//! A pure function from (rule, facts) to a `RuleEvaluation`. It never mutates
//! the rule or the facts; applying actions is the engine's job.

use crate::error::{ErrorCode, RuntimeError};
use crate::expression::builtins::parse_date;
use crate::expression::operators::{execute_binary_op, execute_compare, loose_equal};
use ratewire_core::ast::{
    CellMatcher, ColumnType, ConditionOperator, ConditionalRule, DecisionTableRule, LookupRule,
    Operator, Rule, RuleAction, RuleCondition, RuleKind,
};
use ratewire_core::path::lookup;
use ratewire_core::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Error attached to a single rule evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationError {
    pub code: ErrorCode,
    pub message: String,
}

/// Outcome of evaluating one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_id: String,
    pub matched: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<RuleAction>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EvaluationError>,
}

impl RuleEvaluation {
    fn new(rule_id: &str, matched: bool) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            matched,
            value: None,
            actions: None,
            error: None,
        }
    }

    pub fn not_found(rule_id: &str) -> Self {
        Self::failed(rule_id, ErrorCode::RuleNotFound, format!("Rule not found: {}", rule_id))
    }

    pub fn failed(rule_id: &str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: Some(EvaluationError {
                code,
                message: message.into(),
            }),
            ..Self::new(rule_id, false)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Rule evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a rule against a fact bag
    pub fn evaluate(&self, rule: &Rule, facts: &Value) -> RuleEvaluation {
        let outcome = match &rule.kind {
            RuleKind::Lookup(lookup_rule) => Ok(evaluate_lookup(&rule.id, lookup_rule, facts)),
            RuleKind::DecisionTable(table) => evaluate_table(&rule.id, table, facts),
            RuleKind::Conditional(conditional) => {
                evaluate_conditional(&rule.id, conditional, facts)
            }
        };

        let evaluation = outcome.unwrap_or_else(|e| {
            RuleEvaluation::failed(&rule.id, ErrorCode::EvaluationError, e.to_string())
        });

        tracing::debug!(
            rule_id = %rule.id,
            rule_type = rule.kind.type_name(),
            matched = evaluation.matched,
            error = evaluation.error.is_some(),
            "Rule evaluated"
        );

        evaluation
    }
}

fn evaluate_lookup(rule_id: &str, rule: &LookupRule, facts: &Value) -> RuleEvaluation {
    let hit = lookup(facts, &rule.key_field)
        .filter(|key| !key.is_null())
        .and_then(|key| rule.table.get(&key.to_display_string()));

    match hit {
        Some(value) => RuleEvaluation {
            value: Some(value.clone()),
            ..RuleEvaluation::new(rule_id, true)
        },
        None => RuleEvaluation {
            value: Some(rule.default_value.clone()),
            ..RuleEvaluation::new(rule_id, false)
        },
    }
}

fn evaluate_table(
    rule_id: &str,
    table: &DecisionTableRule,
    facts: &Value,
) -> Result<RuleEvaluation, RuntimeError> {
    // First matching row wins; later rows are never inspected
    for row in &table.rows {
        let mut row_matches = true;
        for column in &table.conditions {
            let Some(matcher) = row.conditions.get(&column.field) else {
                continue;
            };
            let fact = lookup(facts, &column.field);
            if !cell_matches(matcher, column.value_type, fact)? {
                row_matches = false;
                break;
            }
        }

        if row_matches {
            return Ok(RuleEvaluation {
                value: Some(Value::Object(row.outcome.clone())),
                ..RuleEvaluation::new(rule_id, true)
            });
        }
    }

    Ok(RuleEvaluation {
        value: table.default_outcome.clone().map(Value::Object),
        ..RuleEvaluation::new(rule_id, false)
    })
}

fn cell_matches(
    matcher: &CellMatcher,
    column: ColumnType,
    fact: Option<&Value>,
) -> Result<bool, RuntimeError> {
    let fact = fact.unwrap_or(&Value::Null);
    match matcher {
        CellMatcher::Any => Ok(true),
        CellMatcher::Exact(expected) => Ok(cell_equal(column, fact, expected)),
        CellMatcher::OneOf(allowed) => Ok(allowed.iter().any(|v| cell_equal(column, fact, v))),
        CellMatcher::Range { min, max } => {
            if fact.is_null() {
                return Ok(false);
            }
            let Some(fact_key) = ordinal(column, fact) else {
                return Ok(false);
            };
            let bound = |bound: &Value| {
                ordinal(column, bound).ok_or_else(|| {
                    RuntimeError::TypeError(format!("invalid range bound '{}'", bound))
                })
            };
            if let Some(min) = min {
                if fact_key.cmp_to(&bound(min)?) == Ordering::Less {
                    return Ok(false);
                }
            }
            if let Some(max) = max {
                if fact_key.cmp_to(&bound(max)?) == Ordering::Greater {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

/// Comparable form of a cell value for range checks
enum Ordinal {
    Number(f64),
    Date(chrono::NaiveDate),
}

impl Ordinal {
    fn cmp_to(&self, other: &Ordinal) -> Ordering {
        match (self, other) {
            (Ordinal::Number(a), Ordinal::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Ordinal::Date(a), Ordinal::Date(b)) => a.cmp(b),
            // Never constructed together: both sides come from the same column kind
            _ => Ordering::Equal,
        }
    }
}

fn ordinal(column: ColumnType, value: &Value) -> Option<Ordinal> {
    match column {
        ColumnType::Date => value.as_str().and_then(parse_date).map(Ordinal::Date),
        _ => value.to_number().map(Ordinal::Number),
    }
}

fn cell_equal(column: ColumnType, fact: &Value, expected: &Value) -> bool {
    match column {
        ColumnType::Number | ColumnType::Range => match (fact.to_number(), expected.to_number()) {
            (Some(a), Some(b)) => a == b,
            _ => fact == expected,
        },
        ColumnType::Boolean => match (as_flag(fact), as_flag(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => fact == expected,
        },
        ColumnType::Date => match (
            fact.as_str().and_then(parse_date),
            expected.as_str().and_then(parse_date),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => fact == expected,
        },
        ColumnType::String => fact == expected,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn evaluate_conditional(
    rule_id: &str,
    rule: &ConditionalRule,
    facts: &Value,
) -> Result<RuleEvaluation, RuntimeError> {
    let mut all_hold = true;
    for condition in &rule.conditions {
        if !condition_holds(condition, facts)? {
            all_hold = false;
            break;
        }
    }

    Ok(if all_hold {
        RuleEvaluation {
            actions: Some(rule.actions.clone()),
            ..RuleEvaluation::new(rule_id, true)
        }
    } else {
        RuleEvaluation {
            actions: rule.else_actions.clone(),
            ..RuleEvaluation::new(rule_id, false)
        }
    })
}

fn condition_holds(condition: &RuleCondition, facts: &Value) -> Result<bool, RuntimeError> {
    let fact = lookup(facts, &condition.fact).unwrap_or(&Value::Null);
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::Equal => Ok(loose_equal(fact, expected)),
        ConditionOperator::NotEqual => Ok(!loose_equal(fact, expected)),
        ConditionOperator::LessThan => execute_compare(fact, Operator::Lt, expected),
        ConditionOperator::LessThanInclusive => execute_compare(fact, Operator::Le, expected),
        ConditionOperator::GreaterThan => execute_compare(fact, Operator::Gt, expected),
        ConditionOperator::GreaterThanInclusive => execute_compare(fact, Operator::Ge, expected),
        ConditionOperator::In | ConditionOperator::NotIn => {
            if !matches!(expected, Value::Array(_)) {
                return Err(RuntimeError::TypeError(format!(
                    "'{}' needs a list to compare against, got {}",
                    condition.fact,
                    expected.type_name()
                )));
            }
            let found = execute_binary_op(fact, Operator::In, expected)?.is_truthy();
            Ok(found == (condition.operator == ConditionOperator::In))
        }
        ConditionOperator::Contains | ConditionOperator::DoesNotContain => {
            let found = execute_binary_op(fact, Operator::Contains, expected)?.is_truthy();
            Ok(found == (condition.operator == ConditionOperator::Contains))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratewire_core::ast::RuleStatus;

    fn rule(yaml: &str) -> Rule {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn facts(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let rule = rule("id: tax\ntype: lookup\nkey_field: state\ntable: { CA: 0.05, NY: 0.08 }\ndefault_value: 0");
        let evaluator = RuleEvaluator::new();

        let hit = evaluator.evaluate(&rule, &facts(serde_json::json!({"state": "CA"})));
        assert!(hit.matched);
        assert_eq!(hit.value, Some(Value::Number(0.05)));

        let miss = evaluator.evaluate(&rule, &facts(serde_json::json!({"state": "FL"})));
        assert!(!miss.matched);
        assert_eq!(miss.value, Some(Value::Number(0.0)));

        let absent = evaluator.evaluate(&rule, &facts(serde_json::json!({})));
        assert!(!absent.matched);
        assert_eq!(absent.value, Some(Value::Number(0.0)));
    }

    #[test]
    fn test_lookup_stringifies_integral_keys() {
        let rule = rule("id: t\ntype: lookup\nkey_field: policy.class\ntable: { \"7\": 1.4 }");
        let evaluation = RuleEvaluator::new().evaluate(&rule, &facts(serde_json::json!({"policy": {"class": 7}})));
        assert!(evaluation.matched);
        assert_eq!(evaluation.value, Some(Value::Number(1.4)));
    }

    #[test]
    fn test_decision_table_first_match_wins() {
        let rule = rule(
            r#"
id: overlap
type: decision_table
conditions: [{ field: claims, value_type: number }]
rows:
  - conditions: { claims: { max: 5 } }
    outcome: { tier: first }
  - conditions: { claims: { max: 10 } }
    outcome: { tier: second }
"#,
        );
        let evaluation = RuleEvaluator::new().evaluate(&rule, &facts(serde_json::json!({"claims": 1})));
        assert_eq!(evaluation.value.unwrap().get("tier"), Some(&Value::from("first")));
    }

    #[test]
    fn test_decision_table_date_ranges_and_lists() {
        let rule = rule(
            r#"
id: filing
type: decision_table
conditions:
  - { field: effective, value_type: date }
  - { field: state }
rows:
  - conditions: { effective: { min: "2026-01-01", max: "2026-06-30" }, state: [CA, OR] }
    outcome: { filing: H1 }
default_outcome: { filing: legacy }
"#,
        );
        let evaluator = RuleEvaluator::new();
        let h1 = evaluator.evaluate(&rule, &facts(serde_json::json!({"effective": "2026-03-10", "state": "OR"})));
        assert_eq!(h1.value.unwrap().get("filing"), Some(&Value::from("H1")));

        let late = evaluator.evaluate(&rule, &facts(serde_json::json!({"effective": "2026-07-01", "state": "CA"})));
        assert!(!late.matched);
        assert_eq!(late.value.unwrap().get("filing"), Some(&Value::from("legacy")));
    }

    #[test]
    fn test_decision_table_bad_bound_is_evaluation_error() {
        let rule = rule(
            r#"
id: broken
type: decision_table
conditions: [{ field: years, value_type: number }]
rows:
  - conditions: { years: { min: lots } }
    outcome: { x: 1 }
"#,
        );
        let evaluation = RuleEvaluator::new().evaluate(&rule, &facts(serde_json::json!({"years": 3})));
        assert!(!evaluation.matched);
        assert_eq!(evaluation.error.unwrap().code, ErrorCode::EvaluationError);
    }

    #[test]
    fn test_conditional_actions_and_else_are_exclusive() {
        let rule = rule(
            r#"
id: surcharge
type: conditional
conditions:
  - { fact: state, operator: equal, value: CA }
  - { fact: limit, operator: greaterThan, value: 1000000 }
actions:
  - { type: add, target: surcharge, value: 500 }
else_actions:
  - { type: set, target: surcharge, value: 0 }
"#,
        );
        assert_eq!(rule.status, RuleStatus::Active);
        let evaluator = RuleEvaluator::new();

        let hit = evaluator.evaluate(&rule, &facts(serde_json::json!({"state": "CA", "limit": 2000000})));
        assert!(hit.matched);
        assert_eq!(hit.actions.as_ref().unwrap()[0].target, "surcharge");
        assert_eq!(hit.actions.unwrap()[0].value, Some(Value::Number(500.0)));

        let miss = evaluator.evaluate(&rule, &facts(serde_json::json!({"state": "TX", "limit": 2000000})));
        assert!(!miss.matched);
        assert_eq!(miss.actions.unwrap()[0].value, Some(Value::Number(0.0)));
    }

    #[test]
    fn test_conditional_without_else_has_no_actions() {
        let rule = rule(
            "id: r\ntype: conditional\nconditions: [{ fact: tags, operator: contains, value: fleet }]\nactions: [{ type: set, target: fleet, value: true }]",
        );
        let evaluation = RuleEvaluator::new().evaluate(&rule, &facts(serde_json::json!({"tags": ["personal"]})));
        assert!(!evaluation.matched);
        assert!(evaluation.actions.is_none());
    }

    #[test]
    fn test_conditional_exact_key_before_path() {
        let rule = rule(
            "id: r\ntype: conditional\nconditions: [{ fact: driver.age, operator: \">=\", value: 25 }]",
        );
        let evaluation = RuleEvaluator::new()
            .evaluate(&rule, &facts(serde_json::json!({"driver.age": 30, "driver": {"age": 18}})));
        assert!(evaluation.matched);
    }

    #[test]
    fn test_conditional_incompatible_operands() {
        let rule = rule(
            "id: r\ntype: conditional\nconditions: [{ fact: limit, operator: lessThan, value: 10 }]",
        );
        let evaluation = RuleEvaluator::new().evaluate(&rule, &facts(serde_json::json!({"limit": {"amount": 5}})));
        assert_eq!(evaluation.error.unwrap().code, ErrorCode::EvaluationError);
    }

    #[test]
    fn test_membership_operators() {
        let rule = rule(
            "id: r\ntype: conditional\nconditions: [{ fact: state, operator: notIn, value: [NY, NJ] }, { fact: name, operator: doesNotContain, value: Test }]",
        );
        let evaluation = RuleEvaluator::new().evaluate(&rule, &facts(serde_json::json!({"state": "CA", "name": "Acme"})));
        assert!(evaluation.matched);
    }

    #[test]
    fn test_evaluation_is_pure() {
        let rule = rule("id: tax\ntype: lookup\nkey_field: state\ntable: { CA: 0.05 }");
        let input = facts(serde_json::json!({"state": "CA"}));
        let before = (rule.clone(), input.clone());
        let a = RuleEvaluator::new().evaluate(&rule, &input);
        let b = RuleEvaluator::new().evaluate(&rule, &input);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
        assert_eq!(before, (rule, input));
    }
}
