//! Server configuration

use ratewire_sdk::{EngineConfig, RetryPolicy, SystemEndpoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port (HTTP)
    pub port: u16,

    /// Root of the artifact repository
    pub repository_path: PathBuf,

    /// External systems reachable from `call_system` steps, by name
    pub systems: BTreeMap<String, SystemEndpoint>,

    /// Retry policy for `call_system` steps that declare none
    pub default_retry: RetryPolicy,

    /// Enable metrics
    pub enable_metrics: bool,

    /// Log level applied to the ratewire crates when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            repository_path: PathBuf::from("repository"),
            systems: BTreeMap::new(),
            default_retry: RetryPolicy::default(),
            enable_metrics: true,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `.env`, `config/server.*` and `RATEWIRE_*`
    /// environment variables, in increasing precedence
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if exists
        dotenvy::dotenv().ok();

        Self::load_from("config/server")
    }

    /// Load configuration from a specific file (extension optional) plus the
    /// environment. A missing file is not an error.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `RATEWIRE_SYSTEMS__RATEBOOK__BASE_URL`.
    pub fn load_from(file: &str) -> anyhow::Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("RATEWIRE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to read config: {}", e))?;

        cfg.try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize config: {}", e))
    }

    /// Engine configuration for the SDK
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            repository_path: Some(self.repository_path.clone()),
            systems: self.systems.clone(),
            default_retry: self.default_retry.clone(),
            enable_metrics: self.enable_metrics,
        }
    }

    /// Default `EnvFilter` directives derived from `log_level`
    pub fn log_filter(&self) -> String {
        let level = &self.log_level;
        format!(
            "ratewire_server={level},ratewire_sdk={level},ratewire_runtime={level},tower_http=debug"
        )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
