//! Integration tests for the canary API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use grid_canary::api::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;
use verifier_lib::{RunHealthRegistry, VerifierMetrics};

const SCENARIO: &str = "peertube";

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = RunHealthRegistry::new(2);
    health_registry.register(SCENARIO).await;

    let metrics = VerifierMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["scenarios"][SCENARIO]["consecutive_failures"], 0);
}

#[tokio::test]
async fn test_healthz_returns_ok_after_single_failure() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .record_failure(SCENARIO, "reachability: timed out")
        .await;

    let (status, body) = get(app, "/healthz").await;

    // Degraded is still operational
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["scenarios"][SCENARIO]["message"],
        "reachability: timed out"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_at_failure_threshold() {
    let (app, state) = setup_test_app().await;
    for _ in 0..2 {
        state
            .health_registry
            .record_failure(SCENARIO, "no nodes available")
            .await;
    }

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_healthz_returns_503_when_teardown_leaked() {
    let (app, state) = setup_test_app().await;
    state.health_registry.record(SCENARIO, Ok(()), 1).await;

    let (status, _) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;
    state.metrics.record_run("passed");
    state.metrics.set_leaked_resources(0);

    let (status, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("grid_verifier_runs_total"));
    assert!(text.contains("grid_verifier_leaked_resources"));
}

#[tokio::test]
async fn test_scenario_endpoint_reports_single_scenario() {
    let (app, state) = setup_test_app().await;
    state.health_registry.record(SCENARIO, Ok(()), 2).await;

    let (status, body) = get(app, "/scenarios/peertube").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let scenario: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(scenario["status"], "unhealthy");
    assert_eq!(scenario["leaked_resources"], 2);
}

#[tokio::test]
async fn test_scenario_endpoint_ok_while_degraded() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .record_failure(SCENARIO, "deploy_gateway: unexpected contract shape")
        .await;

    let (status, body) = get(app, "/scenarios/peertube").await;

    assert_eq!(status, StatusCode::OK);
    let scenario: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(scenario["consecutive_failures"], 1);
}

#[tokio::test]
async fn test_unknown_scenario_returns_404() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/scenarios/wordpress").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(String::from_utf8(body).unwrap().contains("wordpress"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state) = setup_test_app().await;

    let (status, _) = get(app, "/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
