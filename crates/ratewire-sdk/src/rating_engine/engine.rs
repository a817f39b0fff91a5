//! Core RatingEngine implementation

use super::types::{RejectedArtifact, ReloadReport};
use crate::config::EngineConfig;
use crate::error::Result;
use chrono::NaiveDate;
use ratewire_core::ast::MappingKey;
use ratewire_core::{CoreError, Value};
use ratewire_repository::Repository;
use ratewire_runtime::{
    CancellationToken, EvaluationOptions, MappingExecutor, MappingRegistry, MappingResult,
    Metrics, MetricsCollector, MetricsSnapshot, PipelineOrchestrator, PipelineRegistry,
    PipelineRequest, PipelineRun, RuleBatchResult, RuleRegistry, RulesEngine, RuntimeError,
    SystemAdapter,
};
use std::sync::Arc;
use std::time::Instant;

/// Rating engine
///
/// Owns the rule, mapping and pipeline registries and the engines that read
/// them. Cloning is cheap and every clone sees the same registries, so a
/// reload through one handle is visible to all of them.
#[derive(Clone)]
pub struct RatingEngine {
    repository: Arc<dyn Repository>,
    rules: RuleRegistry,
    mappings: MappingRegistry,
    pipelines: PipelineRegistry,
    rules_engine: RulesEngine,
    executor: MappingExecutor,
    orchestrator: PipelineOrchestrator,
    metrics: Option<Arc<MetricsCollector>>,
    config: EngineConfig,
}

impl RatingEngine {
    /// Wire up an engine with empty registries; call [`reload`](Self::reload)
    /// to populate them
    pub(crate) fn new(
        config: EngineConfig,
        repository: Arc<dyn Repository>,
        adapter: Arc<dyn SystemAdapter>,
    ) -> Self {
        let rules = RuleRegistry::new();
        let mappings = MappingRegistry::new();
        let pipelines = PipelineRegistry::new();

        let metrics = config
            .enable_metrics
            .then(|| Arc::new(MetricsCollector::new()));

        let mut rules_engine = RulesEngine::new(rules.clone());
        let mut executor = MappingExecutor::new();
        if let Some(metrics) = &metrics {
            rules_engine = rules_engine.with_metrics(metrics.clone());
            executor = executor.with_metrics(metrics.clone());
        }

        let mut orchestrator = PipelineOrchestrator::new(
            pipelines.clone(),
            rules_engine.clone(),
            mappings.clone(),
            adapter,
        )
        .with_default_retry(config.default_retry.clone());
        if let Some(metrics) = &metrics {
            orchestrator = orchestrator.with_metrics(metrics.clone());
        }

        Self {
            repository,
            rules,
            mappings,
            pipelines,
            rules_engine,
            executor,
            orchestrator,
            metrics,
            config,
        }
    }

    /// Re-read the repository and replace every registry wholesale.
    ///
    /// Readers see either the old or the new catalog, never a mix within one
    /// registry. Invalid documents and rejected artifacts are reported, not
    /// fatal; only an unreadable repository fails the reload and leaves the
    /// current registries in place.
    pub async fn reload(&self) -> Result<ReloadReport> {
        let start = Instant::now();
        let content = self.repository.load_all().await.map_err(|e| {
            tracing::error!(repository = %self.repository.describe(), error = %e, "Reload failed");
            e
        })?;

        let dangling_rule_refs: Vec<String> = content
            .dangling_rule_refs()
            .into_iter()
            .map(str::to_string)
            .collect();
        for id in &dangling_rule_refs {
            tracing::warn!(rule_id = %id, "Rule set references an undefined rule");
        }

        let issues = content.issues;
        let mut rejected: Vec<RejectedArtifact> = Vec::new();
        rejected.extend(
            self.rules
                .replace_all(content.rules, content.rule_sets)
                .into_iter()
                .map(rejection),
        );
        rejected.extend(
            self.mappings
                .replace_all(content.mappings)
                .into_iter()
                .map(rejection),
        );
        rejected.extend(
            self.pipelines
                .replace_all(content.pipelines)
                .into_iter()
                .map(rejection),
        );

        let rule_catalog = self.rules.snapshot();
        let loaded = ratewire_repository::ContentSummary {
            rules: rule_catalog.rule_count(),
            rule_sets: rule_catalog.rule_set_count(),
            mappings: self.mappings.snapshot().len(),
            pipelines: self.pipelines.snapshot().len(),
            issues: issues.len(),
        };

        tracing::info!(
            repository = %self.repository.describe(),
            rules = loaded.rules,
            rule_sets = loaded.rule_sets,
            mappings = loaded.mappings,
            pipelines = loaded.pipelines,
            issues = issues.len(),
            rejected = rejected.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Registries reloaded"
        );
        if let Some(metrics) = &self.metrics {
            metrics.counter("reloads").inc();
        }

        Ok(ReloadReport {
            loaded,
            issues,
            rejected,
            dangling_rule_refs,
        })
    }

    // ========== Rules ==========

    /// Evaluate one rule; unknown ids come back as a `RULE_NOT_FOUND` evaluation
    pub fn evaluate_rule(&self, rule_id: &str, facts: &Value) -> RuleBatchResult {
        self.rules_engine.evaluate_rule(rule_id, facts)
    }

    /// Evaluate rules in the given order with a shared accumulator
    pub fn evaluate_rules(
        &self,
        rule_ids: &[String],
        facts: &Value,
        options: EvaluationOptions,
    ) -> RuleBatchResult {
        self.rules_engine.evaluate_rules(rule_ids, facts, options)
    }

    pub fn evaluate_rule_set(&self, rule_set_id: &str, facts: &Value) -> Result<RuleBatchResult> {
        Ok(self.rules_engine.evaluate_rule_set(rule_set_id, facts)?)
    }

    /// Evaluate every active rule in scope
    pub fn evaluate_active_rules(
        &self,
        facts: &Value,
        product_line: Option<&str>,
        state: Option<&str>,
        as_of: Option<NaiveDate>,
    ) -> RuleBatchResult {
        match as_of {
            Some(date) => self
                .rules_engine
                .evaluate_active_rules_at(facts, product_line, state, date),
            None => self
                .rules_engine
                .evaluate_active_rules(facts, product_line, state),
        }
    }

    // ========== Mappings ==========

    /// Execute a mapping by id
    pub fn execute_mapping(&self, mapping_id: &str, source: &Value) -> Result<MappingResult> {
        let config = self
            .mappings
            .get(mapping_id)
            .ok_or_else(|| RuntimeError::MappingNotFound(mapping_id.to_string()))?;
        Ok(self.executor.execute(&config, source))
    }

    /// Execute the mapping registered for a system pair, product line and direction
    pub fn execute_mapping_for(&self, key: &MappingKey, source: &Value) -> Result<MappingResult> {
        let config = self
            .mappings
            .find(key)
            .ok_or_else(|| RuntimeError::MappingNotFound(key.to_string()))?;
        Ok(self.executor.execute(&config, source))
    }

    // ========== Pipelines ==========

    /// Route a request to a pipeline and run it
    pub async fn run_pipeline(
        &self,
        request: PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun> {
        Ok(self.orchestrator.run(request, cancel).await?)
    }

    /// Run a specific pipeline without routing
    pub async fn run_pipeline_by_id(
        &self,
        pipeline_id: &str,
        request: PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun> {
        Ok(self
            .orchestrator
            .run_pipeline(pipeline_id, request, cancel)
            .await?)
    }

    // ========== Introspection ==========

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current metrics; `None` when metrics are disabled
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }
}

fn rejection(error: CoreError) -> RejectedArtifact {
    let kind = match &error {
        CoreError::InvalidDefinition { kind, .. } => kind.to_string(),
        _ => "artifact".to_string(),
    };
    RejectedArtifact {
        kind,
        message: error.to_string(),
    }
}

impl std::fmt::Debug for RatingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingEngine")
            .field("repository", &self.repository.describe())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}
