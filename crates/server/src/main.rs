//! RideWise server - bike-share demand prediction service
//!
//! Serves hourly and daily demand predictions, a chat endpoint and
//! health/metrics probes over HTTP.

use anyhow::Result;
use ridewise_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{PredictorMetrics, StructuredLogger},
};
use ridewise_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_NAME: &str = "ridewise-server";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting {}", SERVICE_NAME);

    let config = ServerConfig::load()?;
    info!(
        model_dir = %config.model_dir.display(),
        loader = %config.loader,
        "Server configured"
    );

    let logger = StructuredLogger::new(SERVICE_NAME);
    logger.log_startup(
        SERVICE_VERSION,
        &config.listen_addr(),
        &config.model_dir.display().to_string(),
    );

    let health_registry = HealthRegistry::new();
    let metrics = PredictorMetrics::new();
    let state = Arc::new(api::AppState::new(
        config,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    // Missing models degrade health but do not stop the service
    api::probe_models(Arc::clone(&state)).await;
    let health = health_registry.health().await;
    if health.status != ComponentStatus::Healthy {
        warn!(status = ?health.status, "Starting with degraded model health");
    }

    health_registry.set_ready(true).await;

    api::serve(state, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
