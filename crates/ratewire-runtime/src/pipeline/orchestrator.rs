//! Pipeline orchestrator
//!
//! Routes a request to a pipeline and runs its steps in order over one
//! request-scoped document. Every step leaves a trace entry; the first
//! failing step fails the run and the remaining steps are recorded as
//! skipped.

use super::router::{route, PipelineRequest};
use super::trace::{PipelineRun, StepError, StepStatus, StepTrace};
use super::PipelineRegistry;
use crate::adapter::{call_with_retry, AdapterError, SystemAdapter, SystemRequest};
use crate::error::{ErrorCode, Result, RuntimeError};
use crate::mapping::{MappingExecutor, MappingRegistry};
use crate::observability::Metrics;
use crate::rules::{EvaluationOptions, RuleBatchResult, RulesEngine};
use ratewire_core::ast::{
    CallSystemStep, Direction, MapStep, MappingConfiguration, MappingKey, Pipeline, PipelineStep,
    RetryPolicy, RulesStep, StepKind, ValidateStep,
};
use ratewire_core::path::lookup;
use ratewire_core::{FieldPath, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Request-scoped state threaded through the steps
struct RunState<'r> {
    pipeline: &'r Pipeline,
    request: &'r PipelineRequest,
    document: Value,
    rule_results: BTreeMap<String, Value>,
}

impl RunState<'_> {
    fn product_line(&self) -> Option<&str> {
        self.request
            .product_line
            .as_deref()
            .or(self.pipeline.product_line.as_deref())
    }

    fn source_system(&self) -> Option<&str> {
        self.request
            .source_system
            .as_deref()
            .or(self.pipeline.source_system.as_deref())
    }

    fn target_system(&self) -> Option<&str> {
        self.request
            .target_system
            .as_deref()
            .or(self.pipeline.target_system.as_deref())
    }
}

/// Result of one executed step
enum StepOutcome {
    Succeeded(Option<Value>),
    Failed(StepError, Option<Value>),
    Skipped(String),
}

/// Pipeline orchestrator
#[derive(Clone)]
pub struct PipelineOrchestrator {
    pipelines: PipelineRegistry,
    rules: RulesEngine,
    mappings: MappingRegistry,
    executor: MappingExecutor,
    adapter: Arc<dyn SystemAdapter>,
    default_retry: RetryPolicy,
    metrics: Option<Arc<dyn Metrics>>,
}

impl PipelineOrchestrator {
    pub fn new(
        pipelines: PipelineRegistry,
        rules: RulesEngine,
        mappings: MappingRegistry,
        adapter: Arc<dyn SystemAdapter>,
    ) -> Self {
        Self {
            pipelines,
            rules,
            mappings,
            executor: MappingExecutor::new(),
            adapter,
            default_retry: RetryPolicy::default(),
            metrics: None,
        }
    }

    /// Retry policy for `call_system` steps that declare none
    pub fn with_default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.executor = self.executor.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Route the request and run the selected pipeline
    pub async fn run(&self, request: PipelineRequest, cancel: &CancellationToken) -> Result<PipelineRun> {
        let catalog = self.pipelines.snapshot();
        let pipeline = route(catalog.values(), &request).map_err(|e| {
            tracing::warn!(error = %e, "Routing failed");
            self.count_error(e.code());
            e
        })?;
        Ok(self.execute(&pipeline, &request, cancel).await)
    }

    /// Run a pipeline by id, bypassing routing
    pub async fn run_pipeline(
        &self,
        pipeline_id: &str,
        request: PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun> {
        let pipeline = self
            .pipelines
            .get(pipeline_id)
            .filter(|p| p.enabled)
            .ok_or_else(|| RuntimeError::PipelineNotFound(pipeline_id.to_string()))?;
        Ok(self.execute(&pipeline, &request, cancel).await)
    }

    async fn execute(
        &self,
        pipeline: &Pipeline,
        request: &PipelineRequest,
        cancel: &CancellationToken,
    ) -> PipelineRun {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(%run_id, pipeline_id = %pipeline.id, "Pipeline run started");

        let mut state = RunState {
            pipeline,
            request,
            document: request.payload.clone(),
            rule_results: BTreeMap::new(),
        };
        let mut steps = Vec::with_capacity(pipeline.steps.len());
        let mut failure: Option<StepError> = None;

        for step in pipeline.ordered_steps() {
            let step_start = Instant::now();
            let outcome = if failure.is_some() {
                StepOutcome::Skipped("previous step failed".to_string())
            } else if !step.enabled {
                StepOutcome::Skipped("step disabled".to_string())
            } else {
                self.run_step(step, &mut state, cancel).await
            };

            let mut trace = StepTrace {
                order: step.order,
                name: step.display_name().to_string(),
                kind: step.kind.type_name().to_string(),
                status: StepStatus::Succeeded,
                duration_ms: step_start.elapsed().as_millis() as u64,
                detail: None,
                error: None,
            };
            match outcome {
                StepOutcome::Succeeded(detail) => trace.detail = detail,
                StepOutcome::Failed(error, detail) => {
                    tracing::warn!(
                        %run_id,
                        step = step.order,
                        kind = %trace.kind,
                        code = %error.code,
                        error = %error.message,
                        "Pipeline step failed"
                    );
                    self.count_error(error.code);
                    trace.status = StepStatus::Failed;
                    trace.detail = detail;
                    trace.error = Some(error.clone());
                    failure = Some(error);
                }
                StepOutcome::Skipped(reason) => {
                    trace.status = StepStatus::Skipped;
                    trace.detail = Some(Value::Object(BTreeMap::from([(
                        "reason".to_string(),
                        Value::String(reason),
                    )])));
                }
            }
            steps.push(trace);
        }

        let duration = start.elapsed();
        let success = failure.is_none();
        tracing::info!(
            %run_id,
            pipeline_id = %pipeline.id,
            success,
            duration_ms = duration.as_millis() as u64,
            "Pipeline run finished"
        );

        if let Some(metrics) = &self.metrics {
            metrics.counter("pipeline_runs").inc();
            if !success {
                metrics.counter("pipeline_failures").inc();
            }
            metrics.record_execution_time("pipeline", duration);
        }

        PipelineRun {
            run_id,
            pipeline_id: pipeline.id.clone(),
            success,
            steps,
            output: state.document,
            rule_results: state.rule_results,
            error: failure,
            duration_ms: duration.as_millis() as u64,
        }
    }

    async fn run_step(
        &self,
        step: &PipelineStep,
        state: &mut RunState<'_>,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        tracing::debug!(step = step.order, kind = step.kind.type_name(), "Running step");
        match &step.kind {
            StepKind::Validate(config) => validate(config, state),
            StepKind::MapRequest(config) => self.map(config, Direction::ToCanonical, state),
            StepKind::MapResponse(config) => self.map(config, Direction::FromCanonical, state),
            StepKind::ApplyRules(config) | StepKind::ApplyResponseRules(config) => {
                self.apply_rules(config, state)
            }
            StepKind::CallSystem(config) => self.call_system(config, state, cancel).await,
            StepKind::Unknown => StepOutcome::Skipped("unknown step type".to_string()),
        }
    }

    fn map(&self, step: &MapStep, direction: Direction, state: &mut RunState<'_>) -> StepOutcome {
        let config = match self.resolve_mapping(step, direction, state) {
            Ok(config) => config,
            Err(e) => return StepOutcome::Failed(StepError::from(&e), None),
        };

        let result = self.executor.execute(&config, &state.document);
        let detail = serde_json::to_value(&result.metadata)
            .map(Value::from)
            .ok()
            .map(|mut detail| {
                if let Value::Object(map) = &mut detail {
                    map.insert("warnings".to_string(), Value::from(result.warnings.len() as i64));
                    if !result.errors.is_empty() {
                        let errors = result
                            .errors
                            .iter()
                            .map(|e| Value::String(e.to_string()))
                            .collect();
                        map.insert("errors".to_string(), Value::Array(errors));
                    }
                }
                detail
            });

        if let Some(first) = result.errors.first().filter(|_| !step.allow_partial) {
            let error = StepError::new(
                first.code,
                format!(
                    "mapping '{}' failed on {} field(s); first: {}",
                    config.id,
                    result.errors.len(),
                    first
                ),
            );
            return StepOutcome::Failed(error, detail);
        }

        state.document = result.data;
        StepOutcome::Succeeded(detail)
    }

    fn resolve_mapping(
        &self,
        step: &MapStep,
        direction: Direction,
        state: &RunState<'_>,
    ) -> Result<Arc<MappingConfiguration>> {
        if let Some(id) = &step.mapping_id {
            return self
                .mappings
                .get(id)
                .ok_or_else(|| RuntimeError::MappingNotFound(id.clone()));
        }

        let (Some(source), Some(target)) = (state.source_system(), state.target_system()) else {
            return Err(RuntimeError::MappingNotFound(
                "source and target systems are needed to resolve a mapping".to_string(),
            ));
        };
        // Responses travel back from the target system
        let key = match direction {
            Direction::ToCanonical => MappingKey::new(source, target, state.product_line(), direction),
            Direction::FromCanonical => MappingKey::new(target, source, state.product_line(), direction),
        };
        self.mappings
            .find(&key)
            .ok_or_else(|| RuntimeError::MappingNotFound(key.to_string()))
    }

    fn apply_rules(&self, step: &RulesStep, state: &mut RunState<'_>) -> StepOutcome {
        let options = EvaluationOptions {
            stop_on_first_match: step.stop_on_first_match,
            aggregate_results: step.aggregate_results,
        };

        let batch: RuleBatchResult = if let Some(rule_set) = &step.rule_set {
            match self.rules.evaluate_rule_set(rule_set, &state.document) {
                Ok(batch) => batch,
                Err(e) => return StepOutcome::Failed(StepError::from(&e), None),
            }
        } else if !step.rule_ids.is_empty() {
            self.rules
                .evaluate_rules(&step.rule_ids, &state.document, options)
        } else if step.active_rules {
            let rule_state = step
                .state_field
                .as_deref()
                .and_then(|field| lookup(&state.document, field))
                .and_then(Value::as_str)
                .map(str::to_string);
            self.rules.evaluate_active_rules(
                &state.document,
                state.product_line(),
                rule_state.as_deref(),
            )
        } else {
            return StepOutcome::Skipped("no rules configured".to_string());
        };

        let errors: Vec<Value> = batch
            .errors()
            .map(|e| Value::String(e.rule_id.clone()))
            .collect();
        let mut detail = BTreeMap::new();
        detail.insert("evaluated".to_string(), Value::from(batch.evaluations.len() as i64));
        detail.insert("matched".to_string(), Value::from(batch.matched().count() as i64));
        if !errors.is_empty() {
            detail.insert("errors".to_string(), Value::Array(errors.clone()));
        }
        let detail = Some(Value::Object(detail));

        state.rule_results.extend(batch.results);

        if step.fail_on_error && !errors.is_empty() {
            let message = batch
                .evaluations
                .iter()
                .find_map(|e| e.error.as_ref())
                .map(|e| e.message.clone())
                .unwrap_or_default();
            return StepOutcome::Failed(
                StepError::new(
                    ErrorCode::EvaluationError,
                    format!("{} rule(s) failed: {}", errors.len(), message),
                ),
                detail,
            );
        }
        StepOutcome::Succeeded(detail)
    }

    async fn call_system(
        &self,
        step: &CallSystemStep,
        state: &mut RunState<'_>,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let mut body = state.document.clone();
        if let Some(field) = &step.rule_results_field {
            let attached = FieldPath::parse(field)
                .and_then(|path| path.set(&mut body, Value::Object(state.rule_results.clone())));
            if let Err(e) = attached {
                return StepOutcome::Failed(StepError::from(&RuntimeError::Path(e)), None);
            }
        }

        let request = SystemRequest {
            system: step.system.clone(),
            method: step.method,
            path: step.path.clone(),
            headers: step.headers.clone(),
            body,
            timeout: Duration::from_millis(step.timeout_ms),
        };
        let policy = step.retry.as_ref().unwrap_or(&self.default_retry);

        let outcome = call_with_retry(self.adapter.as_ref(), &request, policy, cancel).await;

        let mut detail = BTreeMap::new();
        detail.insert("system".to_string(), Value::String(step.system.clone()));
        detail.insert("attempts".to_string(), Value::from(outcome.attempts as i64));

        match outcome.result {
            Ok(response) => {
                detail.insert("status".to_string(), Value::from(response.status as i64));
                state.document = response.body;
                StepOutcome::Succeeded(Some(Value::Object(detail)))
            }
            Err(e) => {
                let code = match e {
                    AdapterError::Cancelled => ErrorCode::Cancelled,
                    _ => ErrorCode::SystemCallFailed,
                };
                detail.insert("error".to_string(), Value::String(e.to_string()));
                let message = format!(
                    "call to '{}' failed after {} attempt(s): {}",
                    step.system, outcome.attempts, e
                );
                StepOutcome::Failed(StepError::new(code, message), Some(Value::Object(detail)))
            }
        }
    }

    fn count_error(&self, code: ErrorCode) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error(code.as_str());
        }
    }
}

fn validate(step: &ValidateStep, state: &RunState<'_>) -> StepOutcome {
    let missing: Vec<&String> = step
        .required_fields
        .iter()
        .filter(|field| lookup(&state.document, field).map_or(true, Value::is_null))
        .collect();

    let mut detail = BTreeMap::new();
    detail.insert("checked".to_string(), Value::from(step.required_fields.len() as i64));

    if missing.is_empty() {
        return StepOutcome::Succeeded(Some(Value::Object(detail)));
    }

    let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
    detail.insert(
        "missing".to_string(),
        Value::Array(names.iter().map(|s| Value::from(*s)).collect()),
    );
    StepOutcome::Failed(
        StepError::new(
            ErrorCode::ValidationFailed,
            format!("missing required fields: {}", names.join(", ")),
        ),
        Some(Value::Object(detail)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SystemResponse;
    use crate::observability::MetricsCollector;
    use crate::rules::RuleRegistry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the request body back under `received`
    #[derive(Default)]
    struct Echo {
        bodies: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl SystemAdapter for Echo {
        async fn call(&self, request: &SystemRequest) -> std::result::Result<SystemResponse, AdapterError> {
            self.bodies.lock().unwrap().push(request.body.clone());
            Ok(SystemResponse {
                status: 200,
                body: Value::Object(BTreeMap::from([
                    ("received".to_string(), request.body.clone()),
                    ("premium".to_string(), Value::from(1234.5)),
                ])),
            })
        }
    }

    fn pipeline(yaml: &str) -> Pipeline {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn orchestrator(adapter: Arc<dyn SystemAdapter>) -> PipelineOrchestrator {
        let rules = RuleRegistry::new();
        rules
            .register_rule(
                serde_yaml::from_str(
                    "id: state_tax\ntype: lookup\nkey_field: risk.state\ntable: { CA: 0.05 }\ndefault_value: 0",
                )
                .unwrap(),
            )
            .unwrap();

        let mappings = MappingRegistry::new();
        mappings
            .register(
                serde_yaml::from_str(
                    r#"
id: acme_in
source_system: acme
target_system: ratebook
direction: to_canonical
mappings:
  - { source_path: policy.state, target_path: risk.state, transformation: direct, required: true }
"#,
                )
                .unwrap(),
            )
            .unwrap();
        mappings
            .register(
                serde_yaml::from_str(
                    r#"
id: acme_out
source_system: ratebook
target_system: acme
direction: from_canonical
mappings:
  - { source_path: premium, target_path: quote.premium, transformation: direct }
"#,
                )
                .unwrap(),
            )
            .unwrap();

        let pipelines = PipelineRegistry::new();
        pipelines
            .register(pipeline(
                r#"
id: acme_quote
product_line: auto
source_system: acme
target_system: ratebook
steps:
  - { order: 1, type: validate, required_fields: [policy.state] }
  - { order: 2, type: map_request }
  - { order: 3, type: apply_rules, rule_ids: [state_tax] }
  - { order: 4, type: call_system, system: ratebook, path: /rate, rule_results_field: rating }
  - { order: 5, type: map_response }
  - { order: 6, type: archive }
"#,
            ))
            .unwrap();
        pipelines
            .register(pipeline(
                r#"
id: parked
enabled: false
steps: [{ order: 1, type: validate }]
"#,
            ))
            .unwrap();

        PipelineOrchestrator::new(pipelines, RulesEngine::new(rules), mappings, adapter)
            .with_default_retry(RetryPolicy::none())
    }

    fn request(payload: serde_json::Value) -> PipelineRequest {
        PipelineRequest::new(Value::from(payload)).with_product_line("auto")
    }

    #[tokio::test]
    async fn test_full_run_threads_document() {
        let adapter = Arc::new(Echo::default());
        let metrics = Arc::new(MetricsCollector::new());
        let orchestrator = orchestrator(adapter.clone()).with_metrics(metrics.clone());

        let run = orchestrator
            .run(request(serde_json::json!({"policy": {"state": "CA"}})), &CancellationToken::new())
            .await
            .unwrap();

        assert!(run.success, "{:?}", run.error);
        assert_eq!(run.pipeline_id, "acme_quote");
        assert_eq!(run.count(StepStatus::Succeeded), 5);
        assert_eq!(run.step("unknown").unwrap().status, StepStatus::Skipped);
        assert_eq!(run.rule_results["state_tax"], Value::from(0.05));

        let sent = adapter.bodies.lock().unwrap()[0].clone();
        assert_eq!(
            serde_json::to_value(&sent).unwrap(),
            serde_json::json!({"risk": {"state": "CA"}, "rating": {"state_tax": 0.05}})
        );
        assert_eq!(
            serde_json::to_value(&run.output).unwrap(),
            serde_json::json!({"quote": {"premium": 1234.5}})
        );

        let call = run.step("call_system").unwrap();
        assert_eq!(call.detail.as_ref().unwrap().get("attempts"), Some(&Value::from(1)));
        assert_eq!(metrics.counter("pipeline_runs").get(), 1);
        assert_eq!(metrics.counter("pipeline_failures").get(), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_rest() {
        let adapter = Arc::new(Echo::default());
        let run = orchestrator(adapter.clone())
            .run_pipeline("acme_quote", request(serde_json::json!({"policy": {}})), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!run.success);
        assert_eq!(run.error.as_ref().unwrap().code, ErrorCode::ValidationFailed);
        let validate = run.step("validate").unwrap();
        assert_eq!(
            validate.detail.as_ref().unwrap().get("missing"),
            Some(&Value::Array(vec![Value::from("policy.state")]))
        );
        assert_eq!(run.count(StepStatus::Skipped), 5);
        assert!(adapter.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_pipeline_is_not_found() {
        let err = orchestrator(Arc::new(Echo::default()))
            .run_pipeline("parked", request(serde_json::json!({})), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PipelineNotFound);
    }

    #[tokio::test]
    async fn test_routing_failure() {
        let request = PipelineRequest::new(Value::object()).with_product_line("marine");
        let err = orchestrator(Arc::new(Echo::default()))
            .run(request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RoutingFailed);
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let run = orchestrator(Arc::new(Echo::default()))
            .run(request(serde_json::json!({"policy": {"state": "CA"}})), &cancel)
            .await
            .unwrap();

        assert!(!run.success);
        let call = run.step("call_system").unwrap();
        assert_eq!(call.status, StepStatus::Failed);
        assert_eq!(call.error.as_ref().unwrap().code, ErrorCode::Cancelled);
        assert_eq!(run.step("map_response").unwrap().status, StepStatus::Skipped);
    }
}
