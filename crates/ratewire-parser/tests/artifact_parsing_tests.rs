//! Integration tests for artifact document parsing
//!
//! Exercises complete rule, mapping and pipeline documents the way a
//! repository loads them.

use ratewire_core::ast::*;
use ratewire_core::Value;
use ratewire_parser::{Artifact, DocumentFormat, DocumentParser, ExpressionParser, ParseError};

// =============================================================================
// Rules
// =============================================================================

#[test]
fn test_parse_all_rule_kinds() {
    let content = r#"
rule:
  id: state_tax
  name: State premium tax
  type: lookup
  key_field: state
  table: { CA: 0.05, NY: 0.08 }
  default_value: 0
---
rule:
  id: experience_mod
  name: Experience modifier
  type: decision_table
  priority: 5
  conditions:
    - { field: claims, value_type: number }
    - { field: years, value_type: range }
  rows:
    - conditions: { claims: 0, years: { min: 5 } }
      outcome: { mod: 0.95 }
    - conditions: { claims: 0, years: { min: 0, max: 4 } }
      outcome: { mod: 1.0 }
  default_outcome: { mod: 1.10 }
---
rule:
  id: high_limit_surcharge
  type: conditional
  status: draft
  effective_date: 2026-01-01
  conditions:
    - { fact: state, operator: equal, value: CA }
    - { fact: limit, operator: greaterThan, value: 1000000 }
  actions:
    - { type: add, target: surcharge, value: 500 }
  else_actions:
    - { type: log, message: no surcharge }
"#;
    let results = DocumentParser::parse(content, DocumentFormat::Yaml);
    assert_eq!(results.len(), 3);

    let rules: Vec<Rule> = results
        .into_iter()
        .map(|r| match r.unwrap() {
            Artifact::Rule(rule) => rule,
            other => panic!("Expected rule, got {}", other.kind()),
        })
        .collect();

    assert_eq!(rules[0].kind.type_name(), "lookup");
    assert_eq!(rules[1].kind.type_name(), "decision_table");
    assert_eq!(rules[1].priority, 5);
    assert_eq!(rules[2].status, RuleStatus::Draft);
    assert!(rules[2].effective_date.is_some());

    let RuleKind::Conditional(conditional) = &rules[2].kind else {
        panic!("Expected conditional");
    };
    assert_eq!(conditional.else_actions.as_ref().map(Vec::len), Some(1));
}

#[test]
fn test_unknown_operator_rejects_only_that_rule() {
    let content = r#"
rule:
  id: bad_operator
  type: conditional
  conditions:
    - { fact: state, operator: resembles, value: CA }
---
rule:
  id: good
  type: lookup
  key_field: state
  table: {}
"#;
    let results = DocumentParser::parse_yaml(content);
    assert!(matches!(results[0], Err(ParseError::YamlError(_))));
    assert!(results[1].is_ok());
}

#[test]
fn test_decision_table_with_undeclared_column_is_rejected() {
    let content = r#"
rule:
  id: bad_table
  type: decision_table
  conditions: [{ field: claims }]
  rows:
    - conditions: { claims: 0, territory: 3 }
      outcome: { mod: 1 }
"#;
    let result = DocumentParser::parse_one(content, DocumentFormat::Yaml);
    assert!(matches!(result, Err(ParseError::InvalidDefinition(_))));
}

// =============================================================================
// Mappings and pipelines
// =============================================================================

#[test]
fn test_parse_mapping_json() {
    let content = r#"{
        "mapping": {
            "id": "acme_to_canonical",
            "source_system": "acme",
            "target_system": "canonical",
            "direction": "to_canonical",
            "mappings": [
                {"source_path": "$.insured.first", "target_path": "name.first", "transformation": "direct", "required": true},
                {"target_path": "name.full", "transformation": "concat", "fields": ["insured.first", "insured.last"], "separator": " "},
                {"source_path": "premium", "target_path": "premium", "transformation": "expression", "expression": "round(value * 1.05, 2)"}
            ]
        }
    }"#;
    let artifact = DocumentParser::parse_one(content, DocumentFormat::Json).unwrap();
    let Artifact::Mapping(config) = artifact else {
        panic!("Expected mapping");
    };
    assert_eq!(config.mappings.len(), 3);
    assert_eq!(config.mappings[1].transformation.kind(), "concat");

    // Every embedded expression is parseable
    if let Transformation::Expression { expression } = &config.mappings[2].transformation {
        ExpressionParser::parse(expression).unwrap();
    } else {
        panic!("Expected expression transformation");
    }
}

#[test]
fn test_parse_pipeline_document() {
    let content = r#"
pipeline:
  id: acme_auto_quote
  routing_rules:
    - { product_line: auto, transaction_type: quote, priority: 10 }
  steps:
    - { order: 1, type: validate, required_fields: [policy.state] }
    - { order: 2, type: apply_rules, rule_ids: [state_tax], aggregate_results: true }
    - { order: 3, type: call_system, system: ratebook, method: PUT, timeout_ms: 500 }
"#;
    let Artifact::Pipeline(pipeline) = DocumentParser::parse_one(content, DocumentFormat::Yaml).unwrap() else {
        panic!("Expected pipeline");
    };
    assert!(pipeline.enabled);
    assert_eq!(pipeline.routing_rules[0].priority, 10);

    let StepKind::CallSystem(call) = &pipeline.steps[2].kind else {
        panic!("Expected call_system");
    };
    assert_eq!(call.method, HttpMethod::Put);
    assert_eq!(call.timeout_ms, 500);
    assert!(call.retry.is_none());
}

#[test]
fn test_non_contiguous_pipeline_is_rejected() {
    let content = r#"
pipeline:
  id: gappy
  steps:
    - { order: 1, type: validate }
    - { order: 3, type: map_request }
"#;
    let err = DocumentParser::parse_one(content, DocumentFormat::Yaml).unwrap_err();
    assert!(err.to_string().contains("contiguous"));
}

#[test]
fn test_lookup_table_values_keep_types() {
    let content = r#"
rule:
  id: territory_factor
  type: lookup
  key_field: zip
  table: { "90210": 1.25, "10001": { factor: 1.4, zone: metro } }
"#;
    let Artifact::Rule(rule) = DocumentParser::parse_one(content, DocumentFormat::Yaml).unwrap() else {
        panic!("Expected rule");
    };
    let RuleKind::Lookup(lookup) = rule.kind else {
        panic!("Expected lookup");
    };
    assert_eq!(lookup.table["90210"], Value::Number(1.25));
    assert_eq!(lookup.table["10001"].get("zone"), Some(&Value::from("metro")));
}
