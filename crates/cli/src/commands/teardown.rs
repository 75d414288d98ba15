//! Teardown command

use anyhow::{bail, Context, Result};
use tabled::Tabled;
use verifier_lib::verifier::{teardown_all, teardown_project};
use verifier_lib::TeardownReport;

use crate::client::Connection;
use crate::output::{print_json, print_success, print_table, print_warning, OutputFormat};

pub enum Target {
    /// Everything listed in the connection's project
    Project,
    Names {
        workloads: Vec<String>,
        gateways: Vec<String>,
    },
}

/// Row for resources that could not be deleted
#[derive(Tabled)]
struct LeakRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

pub async fn run_teardown(connection: &Connection, target: Target, format: OutputFormat) -> Result<()> {
    let report = match target {
        Target::Project => {
            if connection.project.is_none() {
                bail!("--all needs a project scope; pass --project or set GRIDV_PROJECT");
            }
            let grid = connection.client()?;
            teardown_project(grid.as_ref())
                .await
                .context("Failed to list project resources")?
        }
        Target::Names {
            workloads,
            gateways,
        } => {
            if workloads.is_empty() && gateways.is_empty() {
                bail!("Nothing to delete; pass --workload, --gateway or --all");
            }
            let grid = connection.client()?;
            teardown_all(grid.as_ref(), &workloads, &gateways).await
        }
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }

    report.into_result().context("Teardown incomplete")?;
    Ok(())
}

fn print_report(report: &TeardownReport) {
    for name in &report.removed {
        print_success(&format!("Deleted {}", name));
    }
    if report.is_clean() {
        print_success(&format!(
            "{} contract(s) removed",
            report.deleted_contracts
        ));
        return;
    }

    print_warning(&format!("{} resource(s) left behind", report.leaked.len()));
    let rows: Vec<LeakRow> = report
        .leaked
        .iter()
        .map(|l| LeakRow {
            kind: format!("{:?}", l.kind).to_lowercase(),
            name: l.name.clone(),
            reason: l.reason.clone(),
        })
        .collect();
    print_table(&rows);
}
