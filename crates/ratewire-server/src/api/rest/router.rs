//! Router creation and configuration

use super::handlers::*;
use super::types::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use ratewire_sdk::{CancellationToken, RatingEngine};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create REST API router
///
/// Cancelling `shutdown` cancels every in-flight pipeline run.
pub fn create_router(engine: RatingEngine, shutdown: CancellationToken) -> Router {
    let state = AppState { engine, shutdown };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/rules/evaluate", post(evaluate_rules))
        .route("/v1/rules/active/evaluate", post(evaluate_active_rules))
        .route("/v1/rules/:id/evaluate", post(evaluate_rule))
        .route("/v1/rule-sets/:id/evaluate", post(evaluate_rule_set))
        .route("/v1/mappings/:id/execute", post(execute_mapping))
        .route("/v1/pipelines/run", post(run_pipeline))
        .route("/v1/pipelines/:id/run", post(run_pipeline_by_id))
        .route("/v1/repo/reload", post(reload_repository))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
