//! Removal of everything a run deployed
//!
//! Deleting a name that no longer exists is not an error; the grid answers
//! with an empty deletion list. Every name is attempted even when an earlier
//! one fails, so a single bad delete does not leak the rest.

use super::checks::expect_deletion_only;
use crate::error::{VerifyError, VerifyResult};
use crate::grid::GridClient;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Workload,
    Gateway,
}

impl ResourceKind {
    fn operation(self) -> &'static str {
        match self {
            Self::Workload => "delete_workload",
            Self::Gateway => "delete_gateway",
        }
    }
}

/// A resource whose delete did not go through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakedResource {
    pub kind: ResourceKind,
    pub name: String,
    pub reason: String,
}

/// Outcome of a teardown pass
#[derive(Debug, Default, Serialize)]
pub struct TeardownReport {
    /// Contracts the grid reported as removed
    pub deleted_contracts: usize,
    pub removed: Vec<String>,
    pub leaked: Vec<LeakedResource>,
    #[serde(skip)]
    first_error: Option<VerifyError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
    }

    pub fn first_error(&self) -> Option<&VerifyError> {
        self.first_error.as_ref()
    }

    /// The report, or the first failure encountered
    pub fn into_result(mut self) -> VerifyResult<Self> {
        match self.first_error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    fn record(&mut self, kind: ResourceKind, name: &str, outcome: VerifyResult<usize>) {
        match outcome {
            Ok(count) => {
                info!(kind = ?kind, name = %name, contracts = count, "Deleted resource");
                self.deleted_contracts += count;
                self.removed.push(name.to_string());
            }
            Err(err) => {
                warn!(kind = ?kind, name = %name, error = %err, "Failed to delete resource");
                self.leaked.push(LeakedResource {
                    kind,
                    name: name.to_string(),
                    reason: err.to_string(),
                });
                if self.first_error.is_none() {
                    self.first_error = Some(err);
                }
            }
        }
    }
}

async fn delete_one(grid: &dyn GridClient, kind: ResourceKind, name: &str) -> VerifyResult<usize> {
    let delta = match kind {
        ResourceKind::Workload => grid.delete_workload(name).await?,
        ResourceKind::Gateway => grid.delete_gateway(name).await?,
    };
    expect_deletion_only(kind.operation(), &delta)
}

/// Delete the given workloads, then the given gateways
pub async fn teardown_all(
    grid: &dyn GridClient,
    workload_names: &[String],
    gateway_names: &[String],
) -> TeardownReport {
    let mut report = TeardownReport::default();

    let targets = workload_names
        .iter()
        .map(|n| (ResourceKind::Workload, n))
        .chain(gateway_names.iter().map(|n| (ResourceKind::Gateway, n)));
    for (kind, name) in targets {
        let outcome = delete_one(grid, kind, name).await;
        report.record(kind, name, outcome);
    }

    report
}

/// Delete everything the grid lists for the client's project
pub async fn teardown_project(grid: &dyn GridClient) -> VerifyResult<TeardownReport> {
    let workloads = grid.list_workloads().await?;
    let gateways = grid.list_gateways().await?;
    info!(
        workloads = workloads.len(),
        gateways = gateways.len(),
        "Tearing down project"
    );
    Ok(teardown_all(grid, &workloads, &gateways).await)
}
