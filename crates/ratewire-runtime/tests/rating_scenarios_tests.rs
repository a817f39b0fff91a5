//! End-to-end rating scenarios
//!
//! Rules, mappings and pipelines are built from YAML the way the repository
//! loads them, then driven through the public runtime API.

use ratewire_core::ast::{MappingConfiguration, Pipeline, Rule};
use ratewire_core::Value;
use ratewire_runtime::{
    CancellationToken, ErrorCode, HttpSystemAdapter, MappingExecutor, MappingRegistry,
    PipelineOrchestrator, PipelineRegistry, PipelineRequest, RuleEvaluator, RuleRegistry,
    RulesEngine, StepStatus, SystemEndpoint,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn rule(yaml: &str) -> Rule {
    serde_yaml::from_str(yaml).unwrap()
}

fn mapping(yaml: &str) -> MappingConfiguration {
    serde_yaml::from_str(yaml).unwrap()
}

fn facts(json: serde_json::Value) -> Value {
    Value::from(json)
}

const STATE_TAX: &str = r#"
id: state_tax
type: lookup
key_field: state
table: { CA: 0.05, NY: 0.08 }
default_value: 0
"#;

const EXPERIENCE_MOD: &str = r#"
id: experience_mod
type: decision_table
conditions:
  - { field: claims, value_type: number }
  - { field: years, value_type: number }
rows:
  - conditions: { claims: 0, years: { min: 5 } }
    outcome: { mod: 0.95 }
  - conditions: { claims: 0, years: { min: 0, max: 4 } }
    outcome: { mod: 1.0 }
  - conditions: { claims: "*", years: "*" }
    outcome: { mod: 1.25 }
default_outcome: { mod: 1.10 }
"#;

const HIGH_LIMIT: &str = r#"
id: high_limit
type: conditional
conditions:
  - { fact: state, operator: equal, value: CA }
  - { fact: limit, operator: greaterThan, value: 1000000 }
actions:
  - { type: add, target: surcharge, value: 500 }
else_actions:
  - { type: set, target: surcharge_waived, value: true }
"#;

// ============================================================================
// Rule scenarios
// ============================================================================

#[test]
fn test_lookup_hit_and_default() {
    let rule = rule(STATE_TAX);
    let evaluator = RuleEvaluator::new();

    let hit = evaluator.evaluate(&rule, &facts(serde_json::json!({"state": "CA"})));
    assert!(hit.matched);
    assert_eq!(hit.value, Some(Value::Number(0.05)));

    let miss = evaluator.evaluate(&rule, &facts(serde_json::json!({"state": "FL"})));
    assert!(!miss.matched);
    assert_eq!(miss.value, Some(Value::Number(0.0)));
}

#[test]
fn test_decision_table_first_match_and_default() {
    let evaluator = RuleEvaluator::new();

    // The catch-all row matches too, the first matching row still wins
    let mut table = rule(EXPERIENCE_MOD);
    let veteran = evaluator.evaluate(&table, &facts(serde_json::json!({"claims": 0, "years": 10})));
    assert!(veteran.matched);
    assert_eq!(veteran.value.unwrap().get("mod"), Some(&Value::Number(0.95)));

    let ratewire_core::ast::RuleKind::DecisionTable(dt) = &mut table.kind else {
        panic!("Expected decision table");
    };
    dt.rows.pop();
    let claims = evaluator.evaluate(&table, &facts(serde_json::json!({"claims": 2, "years": 10})));
    assert!(!claims.matched);
    assert_eq!(claims.value.unwrap().get("mod"), Some(&Value::Number(1.10)));
}

#[test]
fn test_conditional_actions_are_exclusive() {
    let registry = RuleRegistry::new();
    registry.register_rule(rule(HIGH_LIMIT)).unwrap();
    let engine = RulesEngine::new(registry);

    let ca = engine.evaluate_rule("high_limit", &facts(serde_json::json!({"state": "CA", "limit": 2000000})));
    assert!(ca.evaluations[0].matched);
    assert_eq!(ca.results.get("surcharge"), Some(&Value::Number(500.0)));
    assert!(!ca.results.contains_key("surcharge_waived"));

    let tx = engine.evaluate_rule("high_limit", &facts(serde_json::json!({"state": "TX", "limit": 2000000})));
    assert!(!tx.evaluations[0].matched);
    assert!(!tx.results.contains_key("surcharge"));
    assert_eq!(tx.results.get("surcharge_waived"), Some(&Value::Bool(true)));
}

#[test]
fn test_rule_evaluation_is_idempotent() {
    let registry = RuleRegistry::new();
    for yaml in [STATE_TAX, EXPERIENCE_MOD, HIGH_LIMIT] {
        registry.register_rule(rule(yaml)).unwrap();
    }
    let engine = RulesEngine::new(registry);
    let ids = vec![
        "state_tax".to_string(),
        "experience_mod".to_string(),
        "high_limit".to_string(),
    ];
    let facts = facts(serde_json::json!({"state": "CA", "limit": 2000000, "claims": 0, "years": 3}));

    let first = engine.evaluate_rules(&ids, &facts, Default::default());
    let second = engine.evaluate_rules(&ids, &facts, Default::default());
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

// ============================================================================
// Mapping scenarios
// ============================================================================

const ACME_INBOUND: &str = r#"
id: acme_inbound
source_system: acme
target_system: canonical
direction: to_canonical
mappings:
  - { source_path: policy.number, target_path: policy_id, transformation: direct, required: true }
  - { source_path: insured.first, target_path: insured.name, transformation: direct }
  - { source_path: policy.state, target_path: risk.state, transformation: direct }
  - { source_path: policy.fax, target_path: contact.fax, transformation: direct }
  - { source_path: policy.limit, target_path: risk.limit, transformation: direct, validators: ["max:1000000"] }
"#;

#[test]
fn test_required_field_missing_keeps_other_fields() {
    let source = facts(serde_json::json!({
        "insured": {"first": "Ada"},
        "policy": {"state": "CA", "limit": 2000000}
    }));
    let result = MappingExecutor::new().execute(&mapping(ACME_INBOUND), &source);

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, ErrorCode::RequiredFieldMissing);
    assert_eq!(result.errors[0].field, "policy_id");
    assert!(result.data.get("policy_id").is_none());
    assert_eq!(
        serde_json::to_value(&result.data).unwrap(),
        serde_json::json!({"insured": {"name": "Ada"}, "risk": {"state": "CA", "limit": 2000000}})
    );
    // Validator violations never block output
    assert_eq!(result.warnings.iter().filter(|w| w.field == "risk.limit").count(), 1);
}

#[test]
fn test_every_field_is_accounted_for() {
    let source = facts(serde_json::json!({"policy": {"number": "P-1", "state": "NY"}}));
    let result = MappingExecutor::new().execute(&mapping(ACME_INBOUND), &source);

    let meta = &result.metadata;
    assert_eq!(meta.fields_processed, 5);
    assert_eq!(
        result.errors.len() + meta.fields_written + meta.fields_skipped,
        meta.fields_processed
    );
}

#[test]
fn test_mapping_is_idempotent() {
    let config = mapping(ACME_INBOUND);
    let source = facts(serde_json::json!({"policy": {"state": "CA"}}));
    let executor = MappingExecutor::new();

    let first = executor.execute(&config, &source);
    let second = executor.execute(&config, &source);
    assert_eq!(first.data, second.data);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.warnings, second.warnings);
}

// ============================================================================
// Pipeline scenarios
// ============================================================================

const QUOTE_PIPELINE: &str = r#"
id: acme_auto_quote
product_line: auto
source_system: acme
target_system: ratebook
routing_rules:
  - { product_line: auto, source_system: acme, transaction_type: quote, priority: 10 }
steps:
  - { order: 1, type: validate, required_fields: [policy.state] }
  - { order: 2, type: map_request, mapping_id: to_ratebook }
  - { order: 3, type: apply_rules, rule_ids: [state_tax] }
  - order: 4
    type: call_system
    system: ratebook
    path: /v1/rate
    timeout_ms: 2000
    retry: { max_retries: 2, backoff: fixed, initial_delay_ms: 1 }
  - { order: 5, type: map_response, mapping_id: from_ratebook }
"#;

fn quote_orchestrator(base_url: &str) -> PipelineOrchestrator {
    let rules = RuleRegistry::new();
    rules.register_rule(rule(STATE_TAX)).unwrap();

    let mappings = MappingRegistry::new();
    mappings
        .register(mapping(
            r#"
id: to_ratebook
source_system: acme
target_system: ratebook
direction: to_canonical
mappings:
  - { source_path: policy.state, target_path: state, transformation: direct }
"#,
        ))
        .unwrap();
    mappings
        .register(mapping(
            r#"
id: from_ratebook
source_system: ratebook
target_system: acme
direction: from_canonical
mappings:
  - { source_path: premium, target_path: quote.total, transformation: direct }
"#,
        ))
        .unwrap();

    let pipelines = PipelineRegistry::new();
    pipelines
        .register(serde_yaml::from_str::<Pipeline>(QUOTE_PIPELINE).unwrap())
        .unwrap();

    let systems = BTreeMap::from([("ratebook".to_string(), SystemEndpoint::new(base_url))]);
    PipelineOrchestrator::new(
        pipelines,
        RulesEngine::new(rules),
        mappings,
        Arc::new(HttpSystemAdapter::new(systems)),
    )
}

fn quote_request() -> PipelineRequest {
    PipelineRequest::new(facts(serde_json::json!({"policy": {"state": "CA"}})))
        .with_product_line("auto")
        .with_source_system("acme")
        .with_transaction_type("quote")
}

#[tokio::test]
async fn test_quote_pipeline_succeeds() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/rate")
        .match_body(mockito::Matcher::Json(serde_json::json!({"state": "CA"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"premium": 812.4}"#)
        .create_async()
        .await;

    let run = quote_orchestrator(&server.url())
        .run(quote_request(), &CancellationToken::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(run.success);
    assert_eq!(run.count(StepStatus::Succeeded), 5);
    assert_eq!(run.rule_results["state_tax"], Value::Number(0.05));
    assert_eq!(
        serde_json::to_value(&run.output).unwrap(),
        serde_json::json!({"quote": {"total": 812.4}})
    );
}

#[tokio::test]
async fn test_call_system_exhausts_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/rate")
        .with_status(503)
        .with_body("ratebook unavailable")
        .expect(3)
        .create_async()
        .await;

    let run = quote_orchestrator(&server.url())
        .run(quote_request(), &CancellationToken::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(!run.success);
    assert_eq!(run.count(StepStatus::Succeeded), 3);
    assert_eq!(run.count(StepStatus::Failed), 1);

    let call = run.step("call_system").unwrap();
    assert_eq!(call.status, StepStatus::Failed);
    let error = call.error.as_ref().unwrap();
    assert_eq!(error.code, ErrorCode::SystemCallFailed);
    assert!(error.message.contains("503"));
    let detail = call.detail.as_ref().unwrap();
    assert_eq!(detail.get("attempts"), Some(&Value::Number(3.0)));

    assert_eq!(run.step("map_response").unwrap().status, StepStatus::Skipped);
    assert_eq!(run.error.as_ref().unwrap().code, ErrorCode::SystemCallFailed);
}

#[tokio::test]
async fn test_cancellation_keeps_completed_steps() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut request = quote_request();
    request.payload = facts(serde_json::json!({"policy": {"state": "NY"}}));
    let run = quote_orchestrator("http://127.0.0.1:9")
        .run(request, &cancel)
        .await
        .unwrap();

    assert!(!run.success);
    assert_eq!(run.count(StepStatus::Succeeded), 3);
    assert_eq!(run.rule_results["state_tax"], Value::Number(0.08));
    assert_eq!(
        run.step("call_system").unwrap().error.as_ref().unwrap().code,
        ErrorCode::Cancelled
    );
}
