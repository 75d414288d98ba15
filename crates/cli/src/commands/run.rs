//! Scenario run command

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use verifier_lib::{
    DeploymentVerifier, NameGenerator, PollConfig, RandomNames, ReachabilityPoller, RunOutcome,
    RunPlan, ScenarioConfig, Step, TeardownReport, VerificationReport,
};

use crate::client::Connection;
use crate::output::{
    format_millis, print_error, print_info, print_json, print_success, print_table, print_warning,
    OutputFormat,
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RunOptions {
    pub farm_id: u32,
    pub gateway_farm_id: u32,
    pub ssh_key: String,
    pub attempts: u32,
    pub interval: Duration,
    pub seed: Option<u64>,
}

/// JSON shape of a finished run
#[derive(Serialize)]
struct RunSummary<'a> {
    project: String,
    passed: bool,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_step: Option<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a VerificationReport>,
    teardown: &'a TeardownReport,
    elapsed_secs: f64,
    finished_at: String,
}

impl<'a> RunSummary<'a> {
    fn new(plan: &RunPlan, outcome: &'a RunOutcome) -> Self {
        Self {
            project: plan.project(),
            passed: outcome.passed(),
            outcome: outcome.label(),
            failed_step: outcome.failed_step,
            error: outcome.verification.as_ref().err().map(|e| e.to_string()),
            report: outcome.verification.as_ref().ok(),
            teardown: &outcome.teardown,
            elapsed_secs: outcome.elapsed.as_secs_f64(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Row for the step timing table
#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Elapsed")]
    elapsed: String,
}

fn scenario(options: &RunOptions) -> ScenarioConfig {
    let mut scenario = ScenarioConfig::peertube(options.ssh_key.clone());
    scenario.farm_id = options.farm_id;
    scenario.gateway_farm_id = options.gateway_farm_id;
    scenario
}

/// Run the scenario and tear it down; fails if either part failed
pub async fn run_scenario(
    connection: &Connection,
    options: RunOptions,
    format: OutputFormat,
) -> Result<()> {
    let names: Arc<dyn NameGenerator> = match options.seed {
        Some(seed) => Arc::new(RandomNames::seeded(seed)),
        None => Arc::new(RandomNames::from_entropy()),
    };
    let plan = RunPlan::generate(scenario(&options), names.as_ref());

    let grid = connection.client_for(Some(plan.project()))?;
    let poll = PollConfig {
        max_attempts: options.attempts,
        interval: options.interval,
        ..PollConfig::default()
    };
    let poller =
        ReachabilityPoller::http(poll, PROBE_TIMEOUT).context("Failed to create HTTP probe")?;
    let verifier = DeploymentVerifier::new(grid, poller, names);

    if matches!(format, OutputFormat::Table) {
        print_info(&format!(
            "Deploying {} with gateway {} (project {})",
            plan.deployment_name.cyan(),
            plan.gateway_name.cyan(),
            plan.project()
        ));
    }

    let outcome = verifier.run_until(&plan, interrupted()).await;

    match format {
        OutputFormat::Json => print_json(&RunSummary::new(&plan, &outcome))?,
        OutputFormat::Table => print_outcome(&outcome),
    }

    outcome.into_result().context("Verification run failed")?;
    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => eprintln!(
            "{} Interrupted, tearing down before exit",
            "⚠".yellow().bold()
        ),
        Err(_) => std::future::pending::<()>().await,
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match &outcome.verification {
        Ok(report) => {
            println!();
            println!("{}", "Verification Report".bold());
            println!("{}", "=".repeat(60));
            println!("Workload:          {} on node {}", report.workload_name.cyan(), report.workload_node);
            println!("Workload contract: {}", report.workload_contract);
            println!("Gateway:           {} on node {}", report.gateway_name.cyan(), report.gateway_node);
            println!("Gateway contract:  {}", report.gateway_contract);
            println!("Domain:            {}", report.domain);
            println!("Backends:          {}", report.backends.join(", "));
            println!("Probe attempts:    {}", report.probe_attempts);
            println!();

            let rows: Vec<StepRow> = report
                .steps
                .iter()
                .map(|s| StepRow {
                    step: s.step.to_string(),
                    elapsed: format_millis(s.elapsed_ms),
                })
                .collect();
            print_table(&rows);
            println!();
            print_success(&format!("{} is reachable", report.url));
        }
        Err(e) => {
            let step = outcome
                .failed_step
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown step".to_string());
            print_error(&format!("Failed during {}: {}", step.bold(), e));
        }
    }

    let teardown = &outcome.teardown;
    if teardown.is_clean() {
        print_success(&format!(
            "Teardown removed {} contract(s) in {:.1}s total",
            teardown.deleted_contracts,
            outcome.elapsed.as_secs_f64()
        ));
    } else {
        for leaked in &teardown.leaked {
            print_warning(&format!(
                "Not deleted: {:?} {} ({})",
                leaked.kind, leaked.name, leaked.reason
            ));
        }
    }
}
