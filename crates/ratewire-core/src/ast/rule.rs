//! Rule AST definitions
//!
//! A rule is a closed sum over three evaluation strategies, discriminated by
//! `type` in configuration documents:
//!
//! ```yaml
//! rule:
//!   id: state_tax
//!   name: State premium tax
//!   type: lookup
//!   key_field: state
//!   table: { CA: 0.05, NY: 0.08 }
//!   default_value: 0
//! ```

use crate::error::{CoreError, Result};
use crate::types::Value;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule ID
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: RuleStatus,

    #[serde(default = "default_version")]
    pub version: u32,

    /// Product line scope; absent matches every product line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_line: Option<String>,

    /// State scope; absent matches every state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,

    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Evaluation strategy
    #[serde(flatten)]
    pub kind: RuleKind,
}

fn default_version() -> u32 {
    1
}

/// Lifecycle status of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    #[default]
    Active,
    Draft,
    Inactive,
    Deprecated,
}

/// Evaluation strategy of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    Lookup(LookupRule),
    DecisionTable(DecisionTableRule),
    Conditional(ConditionalRule),
}

impl RuleKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            RuleKind::Lookup(_) => "lookup",
            RuleKind::DecisionTable(_) => "decision_table",
            RuleKind::Conditional(_) => "conditional",
        }
    }
}

/// Keyed table lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRule {
    /// Path into the facts holding the lookup key
    pub key_field: String,

    pub table: BTreeMap<String, Value>,

    #[serde(default)]
    pub default_value: Value,
}

/// Decision table: first matching row wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTableRule {
    /// Declared condition columns
    pub conditions: Vec<DecisionColumn>,

    /// Rows in evaluation order
    pub rows: Vec<DecisionRow>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_outcome: Option<BTreeMap<String, Value>>,
}

/// A condition column of a decision table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionColumn {
    /// Fact path the column tests
    pub field: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub value_type: ColumnType,
}

/// Kind of value a decision column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Range,
}

/// A decision table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRow {
    /// Restriction per condition field; a missing field matches anything
    #[serde(default)]
    pub conditions: BTreeMap<String, CellMatcher>,

    pub outcome: BTreeMap<String, Value>,
}

/// Restriction a row places on one column.
///
/// Written in configuration as `"*"` (wildcard), `{min, max}` (inclusive
/// range, either bound optional), a list of allowed values, or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum CellMatcher {
    Any,
    Range { min: Option<Value>, max: Option<Value> },
    OneOf(Vec<Value>),
    Exact(Value),
}

impl From<Value> for CellMatcher {
    fn from(value: Value) -> Self {
        match value {
            Value::String(ref s) if s == "*" => CellMatcher::Any,
            Value::Array(items) => CellMatcher::OneOf(items),
            Value::Object(ref map)
                if !map.is_empty() && map.keys().all(|k| k == "min" || k == "max") =>
            {
                CellMatcher::Range {
                    min: map.get("min").filter(|v| !v.is_null()).cloned(),
                    max: map.get("max").filter(|v| !v.is_null()).cloned(),
                }
            }
            other => CellMatcher::Exact(other),
        }
    }
}

impl From<CellMatcher> for Value {
    fn from(matcher: CellMatcher) -> Self {
        match matcher {
            CellMatcher::Any => Value::String("*".to_string()),
            CellMatcher::OneOf(items) => Value::Array(items),
            CellMatcher::Range { min, max } => {
                let mut map = BTreeMap::new();
                if let Some(min) = min {
                    map.insert("min".to_string(), min);
                }
                if let Some(max) = max {
                    map.insert("max".to_string(), max);
                }
                Value::Object(map)
            }
            CellMatcher::Exact(value) => value,
        }
    }
}

/// Conditional rule: all conditions must hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub conditions: Vec<RuleCondition>,

    #[serde(default)]
    pub actions: Vec<RuleAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_actions: Option<Vec<RuleAction>>,
}

/// One condition of a conditional rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Fact name or path
    pub fact: String,

    pub operator: ConditionOperator,

    #[serde(default)]
    pub value: Value,
}

/// Operators available to conditional rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "equal", alias = "==", alias = "eq")]
    Equal,
    #[serde(rename = "notEqual", alias = "!=", alias = "ne")]
    NotEqual,
    #[serde(rename = "lessThan", alias = "<", alias = "lt")]
    LessThan,
    #[serde(rename = "lessThanInclusive", alias = "<=", alias = "le")]
    LessThanInclusive,
    #[serde(rename = "greaterThan", alias = ">", alias = "gt")]
    GreaterThan,
    #[serde(rename = "greaterThanInclusive", alias = ">=", alias = "ge")]
    GreaterThanInclusive,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "notIn", alias = "not_in")]
    NotIn,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "doesNotContain", alias = "does_not_contain")]
    DoesNotContain,
}

/// Action applied to the result accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,

    /// Result key (dotted paths allowed)
    #[serde(default)]
    pub target: String,

    /// Literal operand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Computed operand, evaluated against the facts and `results`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Message for `log` actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Overwrite the target
    Set,
    /// Add to the target (starting from 0)
    Add,
    /// Multiply the target (starting from 1)
    Multiply,
    /// Append to the list at the target
    Apply,
    /// Record a message
    Log,
}

impl RuleAction {
    pub fn new(action_type: ActionType, target: impl Into<String>, value: Value) -> Self {
        Self {
            action_type,
            target: target.into(),
            value: Some(value),
            expression: None,
            message: None,
        }
    }
}

impl Rule {
    /// Create an active rule with default metadata
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: RuleKind) -> Self {
        Rule {
            id: id.into(),
            name: name.into(),
            description: None,
            status: RuleStatus::Active,
            version: 1,
            product_line: None,
            state: None,
            effective_date: None,
            expiration_date: None,
            priority: 0,
            tags: Vec::new(),
            kind,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_scope(mut self, product_line: Option<&str>, state: Option<&str>) -> Self {
        self.product_line = product_line.map(str::to_string);
        self.state = state.map(str::to_string);
        self
    }

    pub fn with_window(mut self, effective: Option<NaiveDate>, expiration: Option<NaiveDate>) -> Self {
        self.effective_date = effective;
        self.expiration_date = expiration;
        self
    }

    /// Absent scope on either side acts as a wildcard
    pub fn matches_scope(&self, product_line: Option<&str>, state: Option<&str>) -> bool {
        let scoped = |own: &Option<String>, wanted: Option<&str>| match (own, wanted) {
            (Some(own), Some(wanted)) => own.eq_ignore_ascii_case(wanted),
            _ => true,
        };
        scoped(&self.product_line, product_line) && scoped(&self.state, state)
    }

    /// Effective and expiration dates are both inclusive
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_date.map_or(true, |start| start <= date)
            && self.expiration_date.map_or(true, |end| date <= end)
    }

    /// Check structural invariants
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| CoreError::invalid_definition("rule", &self.id, message);

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".to_string()));
        }

        if let (Some(start), Some(end)) = (self.effective_date, self.expiration_date) {
            if start > end {
                return Err(invalid(format!(
                    "effective date {} is after expiration date {}",
                    start, end
                )));
            }
        }

        match &self.kind {
            RuleKind::Lookup(lookup) => {
                if lookup.key_field.trim().is_empty() {
                    return Err(invalid("lookup key_field must not be empty".to_string()));
                }
            }
            RuleKind::DecisionTable(table) => {
                for (index, row) in table.rows.iter().enumerate() {
                    for field in row.conditions.keys() {
                        if !table.conditions.iter().any(|c| &c.field == field) {
                            return Err(invalid(format!(
                                "row {} references undeclared condition '{}'",
                                index, field
                            )));
                        }
                    }
                }
            }
            RuleKind::Conditional(conditional) => {
                let actions = conditional
                    .actions
                    .iter()
                    .chain(conditional.else_actions.iter().flatten());
                for action in actions {
                    if action.action_type != ActionType::Log && action.target.trim().is_empty() {
                        return Err(invalid(format!(
                            "{:?} action requires a target",
                            action.action_type
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_rule_from_yaml() {
        let yaml = r#"
id: state_tax
name: State premium tax
type: lookup
key_field: state
table: { CA: 0.05, NY: 0.08 }
default_value: 0
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.status, RuleStatus::Active);
        assert_eq!(rule.version, 1);
        match &rule.kind {
            RuleKind::Lookup(lookup) => {
                assert_eq!(lookup.key_field, "state");
                assert_eq!(lookup.table.get("CA"), Some(&Value::Number(0.05)));
                assert_eq!(lookup.default_value, Value::Number(0.0));
            }
            other => panic!("Expected lookup, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_decision_table_cells() {
        let yaml = r#"
id: experience_mod
type: decision_table
conditions:
  - { field: claims, value_type: number }
  - { field: years, value_type: range }
  - { field: state }
rows:
  - conditions: { claims: 0, years: { min: 5 }, state: "*" }
    outcome: { mod: 0.95 }
  - conditions: { claims: [1, 2], years: { min: 0, max: 4 } }
    outcome: { mod: 1.0 }
default_outcome: { mod: 1.10 }
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        rule.validate().unwrap();

        let RuleKind::DecisionTable(table) = &rule.kind else {
            panic!("Expected decision table");
        };
        let first = &table.rows[0].conditions;
        assert_eq!(first.get("claims"), Some(&CellMatcher::Exact(Value::Number(0.0))));
        assert_eq!(
            first.get("years"),
            Some(&CellMatcher::Range { min: Some(Value::Number(5.0)), max: None })
        );
        assert_eq!(first.get("state"), Some(&CellMatcher::Any));
        assert!(matches!(table.rows[1].conditions.get("claims"), Some(CellMatcher::OneOf(v)) if v.len() == 2));
    }

    #[test]
    fn test_decision_table_rejects_undeclared_row_key() {
        let yaml = r#"
id: bad_table
type: decision_table
conditions: [{ field: claims }]
rows:
  - conditions: { claims: 0, territory: 5 }
    outcome: { mod: 1 }
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        let err = rule.validate().unwrap_err();
        assert!(err.to_string().contains("territory"));
    }

    #[test]
    fn test_conditional_operator_aliases() {
        let yaml = r#"
id: high_limit_surcharge
type: conditional
conditions:
  - { fact: state, operator: equal, value: CA }
  - { fact: limit, operator: ">", value: 1000000 }
actions:
  - { type: add, target: surcharge, value: 500 }
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        let RuleKind::Conditional(conditional) = &rule.kind else {
            panic!("Expected conditional");
        };
        assert_eq!(conditional.conditions[0].operator, ConditionOperator::Equal);
        assert_eq!(conditional.conditions[1].operator, ConditionOperator::GreaterThan);
        assert_eq!(conditional.actions[0].action_type, ActionType::Add);
        assert!(conditional.else_actions.is_none());
    }

    #[test]
    fn test_unknown_rule_type_is_rejected() {
        let yaml = "id: x\ntype: neural_net\n";
        assert!(serde_yaml::from_str::<Rule>(yaml).is_err());
    }

    #[test]
    fn test_scope_and_window() {
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let rule = Rule::new(
            "r",
            "r",
            RuleKind::Lookup(LookupRule {
                key_field: "state".to_string(),
                table: BTreeMap::new(),
                default_value: Value::Null,
            }),
        )
        .with_scope(Some("auto"), None)
        .with_window(Some(date("2026-01-01")), Some(date("2026-12-31")));

        assert!(rule.matches_scope(Some("AUTO"), Some("CA")));
        assert!(rule.matches_scope(None, None));
        assert!(!rule.matches_scope(Some("home"), None));

        assert!(rule.is_effective_on(date("2026-01-01")));
        assert!(rule.is_effective_on(date("2026-12-31")));
        assert!(!rule.is_effective_on(date("2027-01-01")));
    }

    #[test]
    fn test_cell_matcher_serializes_back() {
        let range = CellMatcher::Range { min: None, max: Some(Value::Number(4.0)) };
        let value: Value = range.clone().into();
        assert_eq!(CellMatcher::from(value), range);
    }
}
