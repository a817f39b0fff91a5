//! Configuration types for RatingEngine

use ratewire_core::ast::RetryPolicy;
use ratewire_runtime::SystemEndpoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root of a file system repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_path: Option<PathBuf>,

    /// External systems reachable from `call_system` steps, by name
    #[serde(default)]
    pub systems: BTreeMap<String, SystemEndpoint>,

    /// Retry policy for `call_system` steps that declare none
    #[serde(default)]
    pub default_retry: RetryPolicy,

    /// Enable metrics collection
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,
}

fn default_enable_metrics() -> bool {
    true
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            repository_path: None,
            systems: BTreeMap::new(),
            default_retry: RetryPolicy::default(),
            enable_metrics: true,
        }
    }

    pub fn with_repository_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository_path = Some(path.into());
        self
    }

    /// Register an external system
    pub fn with_system(mut self, name: impl Into<String>, endpoint: SystemEndpoint) -> Self {
        self.systems.insert(name.into(), endpoint);
        self
    }

    pub fn with_default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Enable metrics
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
