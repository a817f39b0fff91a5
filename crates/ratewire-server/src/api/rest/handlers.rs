//! API endpoint handlers
//!
//! HTTP request handlers for all REST API endpoints.

use super::extractors::JsonExtractor;
use super::types::*;
use crate::error::ServerError;
use axum::{
    extract::{Path, State},
    Json,
};
use ratewire_sdk::{MappingResult, MetricsSnapshot, PipelineRequest, PipelineRun, RuleBatchResult};
use tracing::{error, info, warn};

/// Health check endpoint
pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let rules = state.engine.rules().snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rules: rules.rule_count(),
        rule_sets: rules.rule_set_count(),
        mappings: state.engine.mappings().snapshot().len(),
        pipelines: state.engine.pipelines().snapshot().len(),
    })
}

/// Metrics endpoint - returns the collector snapshot as JSON
pub(super) async fn metrics(
    State(state): State<AppState>,
) -> Result<Json<MetricsSnapshot>, ServerError> {
    state
        .engine
        .metrics()
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("metrics are disabled".to_string()))
}

// ========== Rules ==========

pub(super) async fn evaluate_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    JsonExtractor(payload): JsonExtractor<FactsPayload>,
) -> Result<Json<RuleBatchResult>, ServerError> {
    if state.engine.rules().get_rule(&rule_id).is_none() {
        return Err(ServerError::NotFound(format!("rule '{}'", rule_id)));
    }
    Ok(Json(state.engine.evaluate_rule(&rule_id, &payload.facts)))
}

/// Evaluate an explicit list of rules; unknown ids are reported per rule
pub(super) async fn evaluate_rules(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<EvaluateRulesPayload>,
) -> Result<Json<RuleBatchResult>, ServerError> {
    if payload.rule_ids.is_empty() {
        return Err(ServerError::InvalidRequest(
            "rule_ids must not be empty".to_string(),
        ));
    }
    Ok(Json(state.engine.evaluate_rules(
        &payload.rule_ids,
        &payload.facts,
        payload.options,
    )))
}

pub(super) async fn evaluate_active_rules(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<ActiveRulesPayload>,
) -> Json<RuleBatchResult> {
    Json(state.engine.evaluate_active_rules(
        &payload.facts,
        payload.product_line.as_deref(),
        payload.state.as_deref(),
        payload.as_of,
    ))
}

pub(super) async fn evaluate_rule_set(
    State(state): State<AppState>,
    Path(rule_set_id): Path<String>,
    JsonExtractor(payload): JsonExtractor<FactsPayload>,
) -> Result<Json<RuleBatchResult>, ServerError> {
    Ok(Json(
        state
            .engine
            .evaluate_rule_set(&rule_set_id, &payload.facts)?,
    ))
}

// ========== Mappings ==========

pub(super) async fn execute_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<String>,
    JsonExtractor(payload): JsonExtractor<ExecuteMappingPayload>,
) -> Result<Json<MappingResult>, ServerError> {
    Ok(Json(
        state.engine.execute_mapping(&mapping_id, &payload.source)?,
    ))
}

// ========== Pipelines ==========

/// Route the request to a pipeline and run it.
///
/// A run whose step failed is still a 200; the failure is in the trace.
pub(super) async fn run_pipeline(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<PipelineRequest>,
) -> Result<Json<PipelineRun>, ServerError> {
    let cancel = state.shutdown.child_token();
    let run = state.engine.run_pipeline(request, &cancel).await?;
    log_run(&run);
    Ok(Json(run))
}

pub(super) async fn run_pipeline_by_id(
    State(state): State<AppState>,
    Path(pipeline_id): Path<String>,
    JsonExtractor(request): JsonExtractor<PipelineRequest>,
) -> Result<Json<PipelineRun>, ServerError> {
    let cancel = state.shutdown.child_token();
    let run = state
        .engine
        .run_pipeline_by_id(&pipeline_id, request, &cancel)
        .await?;
    log_run(&run);
    Ok(Json(run))
}

fn log_run(run: &PipelineRun) {
    match &run.error {
        None => info!(
            run_id = %run.run_id,
            pipeline_id = %run.pipeline_id,
            duration_ms = run.duration_ms,
            "Pipeline run served"
        ),
        Some(err) => warn!(
            run_id = %run.run_id,
            pipeline_id = %run.pipeline_id,
            code = %err.code,
            "Pipeline run served with failure"
        ),
    }
}

// ========== Repository ==========

/// Reload repository endpoint
pub(super) async fn reload_repository(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, ServerError> {
    info!("Received repository reload request");

    let report = state.engine.reload().await.map_err(|e| {
        error!("Failed to reload repository: {}", e);
        ServerError::InternalError(format!("Failed to reload repository: {}", e))
    })?;

    let success = report.is_clean();
    let message = if success {
        "Repository reloaded successfully".to_string()
    } else {
        format!(
            "Repository reloaded with {} skipped documents and {} rejected artifacts",
            report.issues.len(),
            report.rejected.len()
        )
    };
    info!("{}", message);

    Ok(Json(ReloadResponse {
        success,
        message,
        report,
    }))
}
