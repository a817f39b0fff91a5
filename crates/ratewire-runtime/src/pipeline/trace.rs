//! Pipeline run traces

use crate::error::{ErrorCode, RuntimeError};
use ratewire_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Error reported by a failed step or run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub code: ErrorCode,
    pub message: String,
}

impl StepError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&RuntimeError> for StepError {
    fn from(error: &RuntimeError) -> Self {
        Self::new(error.code(), error.to_string())
    }
}

/// What happened in one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTrace {
    pub order: u32,
    pub name: String,
    pub kind: String,
    pub status: StepStatus,
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

/// Complete record of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub pipeline_id: String,
    pub success: bool,
    pub steps: Vec<StepTrace>,

    /// Document after the last executed step
    pub output: Value,

    #[serde(default)]
    pub rule_results: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,

    pub duration_ms: u64,
}

impl PipelineRun {
    pub fn step(&self, kind: &str) -> Option<&StepTrace> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}
