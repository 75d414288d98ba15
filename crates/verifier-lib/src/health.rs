//! Health tracking for recurring verification runs
//!
//! Each scenario keeps a consecutive-failure count. A scenario is healthy
//! after a pass, degraded while failures stay below the threshold, and
//! unhealthy at the threshold or whenever teardown left resources behind.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of consecutive failures before a scenario is unhealthy
pub const DEFAULT_UNHEALTHY_AFTER: u32 = 3;

/// Health status of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Recent failures, below the threshold
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the scenario is at least partially passing
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Health of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioHealth {
    pub status: ComponentStatus,
    pub consecutive_failures: u32,
    pub leaked_resources: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_timestamp: Option<i64>,
    pub last_check_timestamp: i64,
}

impl ScenarioHealth {
    fn pending() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            consecutive_failures: 0,
            leaked_resources: 0,
            message: None,
            last_success_timestamp: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    fn classify(&mut self, unhealthy_after: u32) {
        self.status = if self.leaked_resources > 0 || self.consecutive_failures >= unhealthy_after {
            ComponentStatus::Unhealthy
        } else if self.consecutive_failures > 0 {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        };
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub scenarios: HashMap<String, ScenarioHealth>,
}

impl HealthResponse {
    /// Worst status across scenarios
    pub fn compute_status(scenarios: &HashMap<String, ScenarioHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in scenarios.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcome history for every scenario the canary runs
#[derive(Debug, Clone)]
pub struct RunHealthRegistry {
    scenarios: Arc<RwLock<HashMap<String, ScenarioHealth>>>,
    ready: Arc<RwLock<bool>>,
    unhealthy_after: u32,
}

impl Default for RunHealthRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_UNHEALTHY_AFTER)
    }
}

impl RunHealthRegistry {
    pub fn new(unhealthy_after: u32) -> Self {
        Self {
            scenarios: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
            unhealthy_after: unhealthy_after.max(1),
        }
    }

    pub fn unhealthy_after(&self) -> u32 {
        self.unhealthy_after
    }

    /// Register a scenario before its first run
    pub async fn register(&self, scenario: &str) {
        let mut scenarios = self.scenarios.write().await;
        scenarios
            .entry(scenario.to_string())
            .or_insert_with(ScenarioHealth::pending);
    }

    /// Record a finished run; `leaked` is the number of resources teardown failed to delete
    pub async fn record(&self, scenario: &str, result: Result<(), String>, leaked: usize) {
        let mut scenarios = self.scenarios.write().await;
        let health = scenarios
            .entry(scenario.to_string())
            .or_insert_with(ScenarioHealth::pending);

        let now = chrono::Utc::now().timestamp();
        health.last_check_timestamp = now;
        health.leaked_resources = leaked;
        match result {
            Ok(()) => {
                health.consecutive_failures = 0;
                health.last_success_timestamp = Some(now);
                health.message = None;
            }
            Err(message) => {
                health.consecutive_failures += 1;
                health.message = Some(message);
            }
        }
        if leaked > 0 && health.message.is_none() {
            health.message = Some(format!("teardown leaked {leaked} resources"));
        }
        health.classify(self.unhealthy_after);
    }

    pub async fn record_pass(&self, scenario: &str) {
        self.record(scenario, Ok(()), 0).await;
    }

    pub async fn record_failure(&self, scenario: &str, message: impl Into<String>) {
        self.record(scenario, Err(message.into()), 0).await;
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    pub async fn scenario(&self, scenario: &str) -> Option<ScenarioHealth> {
        self.scenarios.read().await.get(scenario).cloned()
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let scenarios = self.scenarios.read().await.clone();
        let status = HealthResponse::compute_status(&scenarios);
        HealthResponse { status, scenarios }
    }

    /// Ready once initialised; run failures do not affect readiness
    pub async fn readiness(&self) -> ReadinessResponse {
        if *self.ready.read().await {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some("Canary not yet initialized".to_string()),
            }
        }
    }
}
