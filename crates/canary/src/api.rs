//! Health, readiness and metrics endpoints
//!
//! `/healthz` folds every scenario into one status; `/scenarios/:name`
//! exposes a single scenario so alerting can point at the one that broke.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};
use verifier_lib::{ComponentStatus, RunHealthRegistry, VerifierMetrics};

#[derive(Clone)]
pub struct AppState {
    pub health_registry: RunHealthRegistry,
    pub metrics: VerifierMetrics,
}

impl AppState {
    pub fn new(health_registry: RunHealthRegistry, metrics: VerifierMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

fn status_for(status: ComponentStatus) -> StatusCode {
    if status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let health = state.health_registry.health().await;
    (status_for(health.status), Json(health)).into_response()
}

/// 404 for scenarios the canary has never registered or run
async fn scenario(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    match state.health_registry.scenario(&name).await {
        Some(health) => (status_for(health.status), Json(health)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("unknown scenario: {name}"),
        )
            .into_response(),
    }
}

async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    let readiness = state.health_registry.readiness().await;
    let code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(readiness)).into_response()
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode() {
        Ok(text) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], text).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/scenarios/:name", get(scenario))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, "Canary API listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
