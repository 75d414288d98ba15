//! Deployment verification
//!
//! [`DeploymentVerifier::verify_deployment`] walks one scenario through the
//! grid: pick nodes, deploy the workload, read it back, front it with a
//! name gateway, read that back, then wait for the public domain to serve
//! the expected page. Any disagreement between what was requested and what
//! the grid reports fails the run.
//!
//! [`DeploymentVerifier::run`] wraps this with cleanup: teardown of every
//! name in the plan happens after verification whatever its outcome.
//! To stop a run early, pass a cancellation future to
//! [`DeploymentVerifier::run_until`]: verification is abandoned when it
//! resolves and teardown still runs. Dropping either future outright skips
//! teardown.

mod checks;
mod teardown;


pub use checks::{backend_urls, check_gateway, check_workload};
pub use teardown::{teardown_all, teardown_project, LeakedResource, ResourceKind, TeardownReport};

use crate::error::{VerifyError, VerifyResult};
use crate::grid::GridClient;
use crate::models::NodeId;
use crate::naming::NameGenerator;
use crate::observability::{StructuredLogger, VerifierMetrics};
use crate::reachability::ReachabilityPoller;
use crate::scenario::{RunPlan, ScenarioConfig};
use crate::selector::NodeSelector;
use checks::{expect_contract_on_node, expect_single_creation, single_view};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Stages of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SelectGatewayNode,
    SelectWorkloadNode,
    DeployWorkload,
    VerifyWorkload,
    DeployGateway,
    VerifyGateway,
    Reachability,
    Teardown,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::SelectGatewayNode => "select_gateway_node",
            Step::SelectWorkloadNode => "select_workload_node",
            Step::DeployWorkload => "deploy_workload",
            Step::VerifyWorkload => "verify_workload",
            Step::DeployGateway => "deploy_gateway",
            Step::VerifyGateway => "verify_gateway",
            Step::Reachability => "reachability",
            Step::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTiming {
    pub step: Step,
    pub elapsed_ms: u64,
}

/// What a passing verification observed
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub project: String,
    pub workload_name: String,
    pub gateway_name: String,
    pub workload_node: NodeId,
    pub gateway_node: NodeId,
    pub workload_contract: u64,
    pub gateway_contract: u64,
    pub domain: String,
    pub url: String,
    pub backends: Vec<String>,
    pub probe_attempts: u32,
    pub steps: Vec<StepTiming>,
}

/// Verification result together with the teardown that followed it
#[derive(Debug)]
pub struct RunOutcome {
    pub verification: VerifyResult<VerificationReport>,
    /// Step that was in progress when verification failed
    pub failed_step: Option<Step>,
    pub teardown: TeardownReport,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.verification.is_ok() && self.teardown.is_clean()
    }

    /// "passed", the verification error kind, or "teardown_failed"
    pub fn label(&self) -> &'static str {
        match &self.verification {
            Err(e) => e.kind(),
            Ok(_) if !self.teardown.is_clean() => "teardown_failed",
            Ok(_) => "passed",
        }
    }

    /// Verification errors take precedence over teardown errors
    pub fn into_result(self) -> VerifyResult<VerificationReport> {
        let report = self.verification?;
        self.teardown.into_result()?;
        Ok(report)
    }
}

#[derive(Default)]
struct Progress {
    current: Option<Step>,
    steps: Vec<StepTiming>,
}

impl Progress {
    fn begin(&mut self, step: Step) -> Instant {
        self.current = Some(step);
        Instant::now()
    }

    fn finish(&mut self, started: Instant) -> Option<(Step, Duration)> {
        let step = self.current?;
        let elapsed = started.elapsed();
        self.steps.push(StepTiming {
            step,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        Some((step, elapsed))
    }
}

/// Drives one scenario through the grid
pub struct DeploymentVerifier {
    grid: Arc<dyn GridClient>,
    selector: NodeSelector,
    poller: ReachabilityPoller,
    names: Arc<dyn NameGenerator>,
    metrics: VerifierMetrics,
}

impl DeploymentVerifier {
    pub fn new(
        grid: Arc<dyn GridClient>,
        poller: ReachabilityPoller,
        names: Arc<dyn NameGenerator>,
    ) -> Self {
        Self {
            selector: NodeSelector::new(grid.clone(), names.clone()),
            grid,
            poller,
            names,
            metrics: VerifierMetrics::new(),
        }
    }

    pub fn grid(&self) -> &Arc<dyn GridClient> {
        &self.grid
    }

    /// Fix names and network for a run of `config`
    pub fn plan(&self, config: ScenarioConfig) -> RunPlan {
        RunPlan::generate(config, self.names.as_ref())
    }

    pub async fn verify_deployment(&self, plan: &RunPlan) -> VerifyResult<VerificationReport> {
        let logger = StructuredLogger::new(plan.deployment_name.as_str());
        self.verify(plan, &mut Progress::default(), &logger).await
    }

    /// Verify, then tear down everything in the plan regardless of outcome
    pub async fn run(&self, plan: &RunPlan) -> RunOutcome {
        self.run_until(plan, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but abandons verification with
    /// [`VerifyError::Cancelled`] once `cancel` resolves. Teardown is awaited
    /// either way.
    pub async fn run_until<C>(&self, plan: &RunPlan, cancel: C) -> RunOutcome
    where
        C: Future<Output = ()>,
    {
        let logger = StructuredLogger::new(plan.deployment_name.as_str());
        logger.run_started(
            &plan.config.solution,
            &plan.deployment_name,
            &plan.gateway_name,
        );
        let started = Instant::now();

        let mut progress = Progress::default();
        let verification = {
            let verify = self.verify(plan, &mut progress, &logger);
            tokio::pin!(verify);
            tokio::select! {
                biased;
                _ = cancel => Err(VerifyError::Cancelled),
                result = &mut verify => result,
            }
        };
        let failed_step = match &verification {
            Ok(_) => None,
            Err(e) => {
                warn!(
                    run_id = %logger.run_id(),
                    step = ?progress.current,
                    kind = e.kind(),
                    error = %e,
                    "Verification failed"
                );
                progress.current
            }
        };

        let teardown_started = Instant::now();
        let teardown = teardown_all(
            self.grid.as_ref(),
            &plan.workload_names(),
            &plan.gateway_names(),
        )
        .await;
        self.metrics
            .observe_step(Step::Teardown.as_str(), teardown_started.elapsed());
        self.metrics.set_leaked_resources(teardown.leaked.len());
        logger.teardown_finished(teardown.deleted_contracts, teardown.leaked.len());

        let outcome = RunOutcome {
            verification,
            failed_step,
            teardown,
            elapsed: started.elapsed(),
        };
        self.metrics.record_run(outcome.label());
        logger.run_finished(outcome.label(), outcome.elapsed);
        outcome
    }

    fn complete(&self, progress: &mut Progress, started: Instant, logger: &StructuredLogger) {
        if let Some((step, elapsed)) = progress.finish(started) {
            self.metrics.observe_step(step.as_str(), elapsed);
            logger.step_completed(step.as_str(), elapsed);
        }
    }

    async fn verify(
        &self,
        plan: &RunPlan,
        progress: &mut Progress,
        logger: &StructuredLogger,
    ) -> VerifyResult<VerificationReport> {
        let started = progress.begin(Step::SelectGatewayNode);
        let twin = self.grid.twin_id().await?;
        let gateway_request = plan.gateway_request(twin);
        let gateway_node = self.selector.select_gateway_node(&gateway_request).await?;
        let public_domain = gateway_node
            .domain()
            .ok_or(VerifyError::NoGatewayAvailable {
                farm_id: gateway_request.farm_id,
            })?;
        let domain = plan.domain(public_domain);
        self.complete(progress, started, logger);

        let started = progress.begin(Step::SelectWorkloadNode);
        let node = self
            .selector
            .select_workload_node(&plan.resource_request(twin))
            .await?;
        self.complete(progress, started, logger);

        let started = progress.begin(Step::DeployWorkload);
        let workload = plan.workload(node.node_id, &domain);
        workload.validate()?;
        let delta = self.grid.deploy_workload(&workload).await?;
        let workload_contract = expect_single_creation("deploy_workload", &delta)?.contract_id;
        info!(
            name = %workload.name,
            node_id = node.node_id,
            contract_id = workload_contract,
            "Workload deployed"
        );
        self.complete(progress, started, logger);

        let started = progress.begin(Step::VerifyWorkload);
        let listed = self.grid.list_workloads().await?;
        if !listed.contains(&workload.name) {
            return Err(VerifyError::mismatch("workload.listed", &workload.name, listed));
        }
        let views = self.grid.get_workload(&workload.name).await?;
        let view = single_view("machine", &views)?;
        check_workload(view, &workload)?;
        let backends = backend_urls(view, plan.config.backend_port)?;
        self.complete(progress, started, logger);

        let started = progress.begin(Step::DeployGateway);
        let gateway = plan.gateway(gateway_node.node_id, backends.clone());
        gateway.validate()?;
        let delta = self.grid.deploy_gateway(&gateway).await?;
        let contract = expect_single_creation("deploy_gateway", &delta)?;
        expect_contract_on_node("deploy_gateway", contract, gateway_node.node_id)?;
        let gateway_contract = contract.contract_id;
        info!(
            name = %gateway.name,
            node_id = gateway_node.node_id,
            contract_id = gateway_contract,
            "Gateway deployed"
        );
        self.complete(progress, started, logger);

        let started = progress.begin(Step::VerifyGateway);
        let views = self.grid.get_gateway(&gateway.name).await?;
        let gateway_view = single_view("gateway", &views)?;
        check_gateway(gateway_view, &gateway)?;
        let url = format!("https://{}", gateway_view.domain);
        self.complete(progress, started, logger);

        let started = progress.begin(Step::Reachability);
        let probe_attempts = self
            .poller
            .poll_until_reachable(&url, &plan.config.expected_fragment)
            .await?;
        self.metrics.observe_probe_attempts(probe_attempts);
        self.complete(progress, started, logger);

        Ok(VerificationReport {
            project: plan.project(),
            workload_name: workload.name,
            gateway_name: gateway.name,
            workload_node: node.node_id,
            gateway_node: gateway_node.node_id,
            workload_contract,
            gateway_contract,
            domain: gateway_view.domain.clone(),
            url,
            backends,
            probe_attempts,
            steps: std::mem::take(&mut progress.steps),
        })
    }
}
