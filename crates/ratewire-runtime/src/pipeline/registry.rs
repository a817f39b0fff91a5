//! Pipeline registry

use crate::registry::SnapshotCell;
use ratewire_core::ast::Pipeline;
use ratewire_core::CoreError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Pipelines keyed by id
pub type PipelineCatalog = BTreeMap<String, Arc<Pipeline>>;

/// Shared handle to the pipeline catalog
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    catalog: Arc<SnapshotCell<PipelineCatalog>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<PipelineCatalog> {
        self.catalog.load()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Pipeline>> {
        self.snapshot().get(id).cloned()
    }

    pub fn register(&self, pipeline: Pipeline) -> Result<(), CoreError> {
        pipeline.validate()?;
        tracing::debug!(pipeline_id = %pipeline.id, steps = pipeline.steps.len(), "Registering pipeline");
        self.catalog.update(|current| {
            let mut next = current.clone();
            next.insert(pipeline.id.clone(), Arc::new(pipeline));
            (next, ())
        });
        Ok(())
    }

    pub fn remove(&self, id: &str) -> bool {
        self.catalog.update(|current| {
            let mut next = current.clone();
            let removed = next.remove(id).is_some();
            (next, removed)
        })
    }

    /// Replace every pipeline; invalid ones are rejected individually
    pub fn replace_all(&self, pipelines: Vec<Pipeline>) -> Vec<CoreError> {
        let mut rejected = Vec::new();
        let mut catalog = PipelineCatalog::new();
        for pipeline in pipelines {
            match pipeline.validate() {
                Ok(()) => {
                    catalog.insert(pipeline.id.clone(), Arc::new(pipeline));
                }
                Err(e) => {
                    tracing::warn!(pipeline_id = %pipeline.id, error = %e, "Rejecting pipeline");
                    rejected.push(e);
                }
            }
        }
        tracing::info!(pipelines = catalog.len(), rejected = rejected.len(), "Pipeline catalog replaced");
        self.catalog.store(catalog);
        rejected
    }
}
