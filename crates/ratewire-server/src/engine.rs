//! Rating engine initialization
//!
//! Converts the server configuration into an SDK configuration and lets the
//! SDK builder perform the initial repository load.

use crate::config::ServerConfig;
use anyhow::Result;
use ratewire_sdk::{RatingEngine, RatingEngineBuilder};
use tracing::{info, warn};

/// Initialize the rating engine from the configured repository
pub async fn init_engine(config: &ServerConfig) -> Result<RatingEngine> {
    if !config.repository_path.is_dir() {
        warn!(
            path = %config.repository_path.display(),
            "Repository path is not a directory"
        );
    }

    let engine = RatingEngineBuilder::new()
        .with_config(config.engine_config())
        .build()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize rating engine: {}", e))?;

    let rules = engine.rules().snapshot();
    info!(
        rules = rules.rule_count(),
        rule_sets = rules.rule_set_count(),
        mappings = engine.mappings().snapshot().len(),
        pipelines = engine.pipelines().snapshot().len(),
        "Rating engine initialized"
    );

    Ok(engine)
}
