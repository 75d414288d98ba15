//! Grid Canary - scheduled deployment verification
//!
//! Runs the deployment scenario against the grid on a fixed interval and
//! reports run health and metrics over HTTP.

use anyhow::Result;
use grid_canary::{
    api::{self, AppState},
    Canary, CanaryConfig,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use verifier_lib::{RunHealthRegistry, VerifierMetrics};

const CANARY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = CANARY_VERSION, "Starting grid-canary");

    let config = CanaryConfig::load()?;
    info!(
        grid_url = %config.grid_url,
        farm_id = config.farm_id,
        interval_secs = config.interval_secs,
        "Canary configured"
    );

    let health_registry = RunHealthRegistry::new(config.unhealthy_after);
    let canary = Canary::new(config.clone(), health_registry.clone());
    health_registry.register(&canary.scenario_name()).await;

    let metrics = VerifierMetrics::new();
    let app_state = Arc::new(AppState::new(health_registry.clone(), metrics));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state, async move {
        let _ = api_shutdown.recv().await;
    }));

    let canary_handle = tokio::spawn(canary.run_loop(shutdown_tx.subscribe()));

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    info!(reason = "SIGINT received", "Shutting down");
    let _ = shutdown_tx.send(());

    if let Err(e) = canary_handle.await {
        error!(error = %e, "Canary loop panicked");
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task panicked"),
        Ok(Ok(())) => {}
    }

    Ok(())
}
