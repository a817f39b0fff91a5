//! Builder pattern for RatingEngine

use crate::config::EngineConfig;
use crate::error::{Result, SdkError};
use crate::rating_engine::RatingEngine;
use ratewire_core::ast::RetryPolicy;
use ratewire_repository::{FileSystemRepository, MemoryRepository, Repository};
use ratewire_runtime::{HttpSystemAdapter, SystemAdapter, SystemEndpoint};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for RatingEngine
///
/// # Example
///
/// ```rust,ignore
/// use ratewire_sdk::RatingEngineBuilder;
///
/// // From a file system repository
/// let engine = RatingEngineBuilder::new()
///     .with_repository_path("repository")
///     .with_system("ratebook", SystemEndpoint::new("https://ratebook.internal"))
///     .build()
///     .await?;
///
/// // Inline documents (for testing)
/// let engine = RatingEngineBuilder::new()
///     .add_yaml("rules.yaml", yaml_content)
///     .build()
///     .await?;
/// ```
pub struct RatingEngineBuilder {
    config: EngineConfig,
    repository: Option<Arc<dyn Repository>>,
    adapter: Option<Arc<dyn SystemAdapter>>,
    documents: Vec<(String, String)>,
}

impl RatingEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: EngineConfig::new(),
            repository: None,
            adapter: None,
            documents: Vec::new(),
        }
    }

    /// Start from an existing configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    // ========== Repository Configuration ==========

    /// Load artifacts from a file system repository
    pub fn with_repository_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.repository_path = Some(path.into());
        self
    }

    /// Load artifacts from a custom repository
    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Add YAML artifact documents directly (alternative to a repository)
    ///
    /// # Arguments
    /// * `name` - Source name reported with load issues
    /// * `content` - One or more `---` separated documents
    pub fn add_yaml(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.documents.push((name.into(), content.into()));
        self
    }

    // ========== External Systems ==========

    /// Register an external system for the HTTP adapter
    pub fn with_system(mut self, name: impl Into<String>, endpoint: SystemEndpoint) -> Self {
        self.config.systems.insert(name.into(), endpoint);
        self
    }

    /// Replace the HTTP adapter, e.g. with a test double
    pub fn with_adapter(mut self, adapter: Arc<dyn SystemAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_default_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.default_retry = policy;
        self
    }

    /// Enable metrics
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.config.enable_metrics = enable;
        self
    }

    /// Build the engine and perform the initial load.
    ///
    /// Exactly one artifact source may be configured: a custom repository, a
    /// repository path, or inline documents. With none the engine starts
    /// empty.
    pub async fn build(self) -> Result<RatingEngine> {
        let repository = self.resolve_repository()?;
        let adapter: Arc<dyn SystemAdapter> = match self.adapter {
            Some(adapter) => adapter,
            None => Arc::new(HttpSystemAdapter::new(self.config.systems.clone())),
        };

        tracing::info!(
            repository = %repository.describe(),
            systems = self.config.systems.len(),
            metrics = self.config.enable_metrics,
            "Building rating engine"
        );

        let engine = RatingEngine::new(self.config, repository, adapter);
        let report = engine.reload().await?;
        if !report.is_clean() {
            tracing::warn!(
                issues = report.issues.len(),
                rejected = report.rejected.len(),
                "Initial load skipped invalid artifacts"
            );
        }
        Ok(engine)
    }

    fn resolve_repository(&self) -> Result<Arc<dyn Repository>> {
        let sources = [
            self.repository.is_some(),
            self.config.repository_path.is_some(),
            !self.documents.is_empty(),
        ];
        if sources.iter().filter(|s| **s).count() > 1 {
            return Err(SdkError::ConfigError(
                "configure only one of a repository, a repository path or inline documents"
                    .to_string(),
            ));
        }

        if let Some(repository) = &self.repository {
            return Ok(repository.clone());
        }
        if let Some(path) = &self.config.repository_path {
            return Ok(Arc::new(FileSystemRepository::new(path)?));
        }

        let memory = self
            .documents
            .iter()
            .fold(MemoryRepository::new(), |repo, (name, content)| {
                repo.with_yaml(name.clone(), content.clone())
            });
        Ok(Arc::new(memory))
    }
}

impl Default for RatingEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_empty() {
        let engine = RatingEngineBuilder::new().enable_metrics(false).build().await.unwrap();

        assert!(engine.metrics().is_none());
        assert_eq!(engine.rules().snapshot().rule_count(), 0);
    }

    #[tokio::test]
    async fn test_builder_rejects_two_sources() {
        let err = RatingEngineBuilder::new()
            .with_repository_path("repository")
            .add_yaml("inline", "rule: { id: a, type: lookup, key_field: k, table: {} }")
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_builder_missing_repository_path() {
        let err = RatingEngineBuilder::new()
            .with_repository_path("/no/such/repository")
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::RepositoryError(_)));
    }
}
