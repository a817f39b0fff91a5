//! Pipeline routing

use crate::error::{Result, RuntimeError};
use ratewire_core::ast::{Pipeline, RoutingRule};
use ratewire_core::Value;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// Inbound request to run a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_line: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,

    /// Request document
    #[serde(default)]
    pub payload: Value,
}

impl PipelineRequest {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    pub fn with_product_line(mut self, product_line: impl Into<String>) -> Self {
        self.product_line = Some(product_line.into());
        self
    }

    pub fn with_source_system(mut self, source_system: impl Into<String>) -> Self {
        self.source_system = Some(source_system.into());
        self
    }

    pub fn with_target_system(mut self, target_system: impl Into<String>) -> Self {
        self.target_system = Some(target_system.into());
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: impl Into<String>) -> Self {
        self.transaction_type = Some(transaction_type.into());
        self
    }

    fn describe(&self) -> String {
        format!(
            "product_line={} source_system={} transaction_type={}",
            self.product_line.as_deref().unwrap_or("-"),
            self.source_system.as_deref().unwrap_or("-"),
            self.transaction_type.as_deref().unwrap_or("-"),
        )
    }
}

/// Routing rules of a pipeline; one built from its own scoping when it declares none
fn routing_rules(pipeline: &Pipeline) -> Cow<'_, [RoutingRule]> {
    if pipeline.routing_rules.is_empty() {
        Cow::Owned(vec![RoutingRule {
            product_line: pipeline.product_line.clone(),
            source_system: pipeline.source_system.clone(),
            transaction_type: None,
            priority: 0,
        }])
    } else {
        Cow::Borrowed(&pipeline.routing_rules)
    }
}

/// Pick the enabled pipeline whose best matching routing rule has the
/// highest priority. Ties go to the smallest pipeline id.
pub fn route<'a, I>(pipelines: I, request: &PipelineRequest) -> Result<Arc<Pipeline>>
where
    I: IntoIterator<Item = &'a Arc<Pipeline>>,
{
    let mut best: Option<(i32, &Arc<Pipeline>)> = None;

    for pipeline in pipelines.into_iter().filter(|p| p.enabled) {
        let priority = routing_rules(pipeline)
            .iter()
            .filter(|rule| {
                rule.matches(
                    request.product_line.as_deref(),
                    request.source_system.as_deref(),
                    request.transaction_type.as_deref(),
                )
            })
            .map(|rule| rule.priority)
            .max();

        let Some(priority) = priority else {
            continue;
        };
        let better = match best {
            None => true,
            Some((best_priority, best_pipeline)) => {
                priority > best_priority
                    || (priority == best_priority && pipeline.id < best_pipeline.id)
            }
        };
        if better {
            best = Some((priority, pipeline));
        }
    }

    match best {
        Some((priority, pipeline)) => {
            tracing::info!(pipeline_id = %pipeline.id, priority, "Routed request");
            Ok(pipeline.clone())
        }
        None => Err(RuntimeError::RoutingFailed(request.describe())),
    }
}
