//! Mapping executor

use super::transformer::{FieldTransformer, TransformContext};
use super::validators::validate_field;
use super::{FieldError, FieldWarning, WarningCode};
use crate::error::ErrorCode;
use crate::observability::Metrics;
use ratewire_core::ast::{Direction, MappingConfiguration};
use ratewire_core::{FieldPath, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Execution statistics of one mapping run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingMetadata {
    pub mapping_id: String,
    pub source_system: String,
    pub target_system: String,
    pub direction: Direction,
    pub fields_processed: usize,
    pub fields_written: usize,
    pub fields_skipped: usize,
    pub fields_failed: usize,
    pub duration_ms: u64,
}

/// Result of applying a mapping configuration to a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingResult {
    /// True when no field failed
    pub success: bool,
    pub data: Value,
    pub errors: Vec<FieldError>,
    pub warnings: Vec<FieldWarning>,
    pub metadata: MappingMetadata,
}

/// Mapping executor
#[derive(Clone, Default)]
pub struct MappingExecutor {
    transformer: FieldTransformer,
    metrics: Option<Arc<dyn Metrics>>,
}

impl MappingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Apply every field mapping in declared order.
    ///
    /// A failing field is recorded and skipped; it never aborts its siblings.
    pub fn execute(&self, config: &MappingConfiguration, source: &Value) -> MappingResult {
        let start = Instant::now();
        let context = TransformContext::new(config, source);

        let mut data = Value::object();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut written = 0;
        let mut skipped = 0;

        for mapping in &config.mappings {
            let value = match self.transformer.transform(mapping, &context) {
                Ok(Some(value)) => value,
                Ok(None) => {
                    skipped += 1;
                    warnings.push(FieldWarning::new(
                        &mapping.target_path,
                        WarningCode::FieldSkipped,
                        "source value is undefined",
                    ));
                    continue;
                }
                Err(e) => {
                    tracing::debug!(
                        mapping_id = %config.id,
                        field = %e.field,
                        code = %e.code,
                        error = %e.message,
                        "Field transformation failed"
                    );
                    errors.push(e);
                    continue;
                }
            };

            let write = FieldPath::parse(&mapping.target_path)
                .and_then(|path| path.set(&mut data, value.clone()));
            if let Err(e) = write {
                errors.push(FieldError::new(
                    &mapping.target_path,
                    ErrorCode::UnexpectedError,
                    e.to_string(),
                ));
                continue;
            }

            written += 1;
            warnings.extend(validate_field(&mapping.target_path, &value, &mapping.validators));
        }

        let metadata = MappingMetadata {
            mapping_id: config.id.clone(),
            source_system: config.source_system.clone(),
            target_system: config.target_system.clone(),
            direction: config.direction,
            fields_processed: config.mappings.len(),
            fields_written: written,
            fields_skipped: skipped,
            fields_failed: errors.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::debug!(
            mapping_id = %config.id,
            processed = metadata.fields_processed,
            written,
            skipped,
            failed = metadata.fields_failed,
            "Mapping executed"
        );

        if let Some(metrics) = &self.metrics {
            metrics.counter("mappings_executed").inc();
            metrics.counter("mapping_field_errors").add(errors.len() as u64);
            metrics.record_execution_time("mapping", start.elapsed());
        }

        MappingResult {
            success: errors.is_empty(),
            data,
            errors,
            warnings,
            metadata,
        }
    }
}
