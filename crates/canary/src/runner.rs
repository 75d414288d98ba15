//! Periodic verification runs

use crate::config::CanaryConfig;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use verifier_lib::{
    DeploymentVerifier, HttpGridClient, RandomNames, ReachabilityPoller, RunHealthRegistry,
    RunOutcome, RunPlan, VerifyError,
};

/// Runs the configured scenario on a fixed interval
pub struct Canary {
    config: CanaryConfig,
    health: RunHealthRegistry,
}

impl Canary {
    pub fn new(config: CanaryConfig, health: RunHealthRegistry) -> Self {
        Self { config, health }
    }

    /// Scenario label used for health tracking
    pub fn scenario_name(&self) -> String {
        self.config.scenario().solution
    }

    /// One full run: plan, verify, tear down, record. Verification stops
    /// early when `cancel` resolves; teardown does not.
    pub async fn run_once<C>(&self, cancel: C) -> Result<RunOutcome>
    where
        C: Future<Output = ()>,
    {
        let names = Arc::new(RandomNames::from_entropy());
        let plan = RunPlan::generate(self.config.scenario(), names.as_ref());

        let grid = HttpGridClient::new(self.config.grid_config(plan.project()))
            .context("failed to build grid client")?;
        let poller = ReachabilityPoller::http(self.config.poll_config(), self.config.probe_timeout())
            .context("failed to build reachability probe")?;
        let verifier = DeploymentVerifier::new(Arc::new(grid), poller, names);

        info!(
            project = %plan.project(),
            started_at = %chrono::Utc::now().to_rfc3339(),
            "Starting scheduled verification run"
        );
        let outcome = verifier.run_until(&plan, cancel).await;
        record_outcome(&self.health, &plan.config.solution, &outcome).await;
        Ok(outcome)
    }

    /// Run until a shutdown signal arrives. A signal during a run cuts
    /// verification short, but the run still tears down before the loop exits.
    pub async fn run_loop(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let due = tokio::select! {
                biased;
                _ = shutdown.recv() => false,
                _ = ticker.tick() => true,
            };
            if !due {
                info!("Canary loop stopping");
                break;
            }

            let stop = async {
                let _ = shutdown.recv().await;
            };
            match self.run_once(stop).await {
                Ok(outcome) if matches!(outcome.verification, Err(VerifyError::Cancelled)) => {
                    info!("Canary loop stopping after cancelled run");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Verification run could not start");
                    self.health
                        .record_failure(&self.scenario_name(), e.to_string())
                        .await;
                }
            }
        }
    }
}

/// Fold a run outcome into the health registry. Cancelled runs say nothing
/// about the grid and are not recorded.
pub async fn record_outcome(health: &RunHealthRegistry, scenario: &str, outcome: &RunOutcome) {
    let result = match &outcome.verification {
        Err(VerifyError::Cancelled) => return,
        Ok(_) => Ok(()),
        Err(e) => Err(match outcome.failed_step {
            Some(step) => format!("{step}: {e}"),
            None => e.to_string(),
        }),
    };
    health.record(scenario, result, outcome.teardown.leaked.len()).await;
}
