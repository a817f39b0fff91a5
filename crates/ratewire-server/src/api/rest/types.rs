//! REST API type definitions
//!
//! Request and response types for the REST API endpoints.

use chrono::NaiveDate;
use ratewire_sdk::{CancellationToken, EvaluationOptions, RatingEngine, ReloadReport, Value};
use serde::{Deserialize, Serialize};

/// Application state
///
/// The engine is shared by clone; reloads swap its registries in place.
#[derive(Clone)]
pub struct AppState {
    pub engine: RatingEngine,

    /// Cancelled on shutdown; every pipeline run gets a child token
    pub shutdown: CancellationToken,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rules: usize,
    pub rule_sets: usize,
    pub mappings: usize,
    pub pipelines: usize,
}

/// Facts for a single rule or a rule set
#[derive(Debug, Deserialize)]
pub struct FactsPayload {
    #[serde(default)]
    pub facts: Value,
}

/// Ad-hoc batch of rules, evaluated in the given order
#[derive(Debug, Deserialize)]
pub struct EvaluateRulesPayload {
    pub rule_ids: Vec<String>,

    #[serde(default)]
    pub facts: Value,

    #[serde(default)]
    pub options: EvaluationOptions,
}

/// Scope for evaluating every active rule
#[derive(Debug, Deserialize)]
pub struct ActiveRulesPayload {
    #[serde(default)]
    pub facts: Value,

    #[serde(default)]
    pub product_line: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    /// Date the effective window is checked against; today when omitted
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Source document for a mapping
#[derive(Debug, Deserialize)]
pub struct ExecuteMappingPayload {
    #[serde(default)]
    pub source: Value,
}

/// Reload repository endpoint response
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    /// False when any document or artifact was skipped
    pub success: bool,
    pub message: String,
    pub report: ReloadReport,
}
