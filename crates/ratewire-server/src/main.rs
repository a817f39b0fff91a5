//! Ratewire HTTP Server
//!
//! Provides a REST API for rating rules, field mappings and pipelines.

use anyhow::Result;
use ratewire_sdk::CancellationToken;
use ratewire_server::api;
use ratewire_server::config::ServerConfig;
use ratewire_server::engine;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = ServerConfig::load()?;

    // Initialize tracing
    init_tracing(&config)?;
    info!("Loaded configuration: {:?}", config);

    // Initialize rating engine
    let engine = engine::init_engine(&config).await?;

    let shutdown = CancellationToken::new();
    let app = api::create_router(engine, shutdown.clone());

    // Start server
    let addr = config.bind_address();
    info!("Starting server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    info!("✓ Server listening on http://{}", addr);
    info!("  Health check: http://{}/health", addr);
    info!("  Metrics: http://{}/metrics", addr);
    info!("  Rules: POST http://{}/v1/rules/:id/evaluate", addr);
    info!("  Mappings: POST http://{}/v1/mappings/:id/execute", addr);
    info!("  Pipelines: POST http://{}/v1/pipelines/run", addr);
    info!("  Reload repository: POST http://{}/v1/repo/reload", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(config: &ServerConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}

/// Resolve on Ctrl-C and cancel in-flight pipeline runs
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
