//! Node selection for workloads and gateways

use crate::error::{VerifyError, VerifyResult};
use crate::grid::GridClient;
use crate::models::{NodeCandidate, ResourceRequest};
use crate::naming::NameGenerator;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Picks nodes that can host a request
#[derive(Clone)]
pub struct NodeSelector {
    grid: Arc<dyn GridClient>,
    names: Arc<dyn NameGenerator>,
}

impl NodeSelector {
    pub fn new(grid: Arc<dyn GridClient>, names: Arc<dyn NameGenerator>) -> Self {
        Self { grid, names }
    }

    /// Candidates from the grid that satisfy the request in every dimension
    pub async fn candidates(&self, req: &ResourceRequest) -> VerifyResult<Vec<NodeCandidate>> {
        let returned = self.grid.filter_nodes(&req.to_filter()).await?;
        let total = returned.len();
        let candidates: Vec<_> = returned.into_iter().filter(|n| n.satisfies(req)).collect();

        debug!(
            farm_id = req.farm_id,
            gateway = req.requires_gateway,
            returned = total,
            eligible = candidates.len(),
            "Filtered node candidates"
        );
        Ok(candidates)
    }

    /// A random gateway node that exposes a public domain
    pub async fn select_gateway_node(&self, req: &ResourceRequest) -> VerifyResult<NodeCandidate> {
        let mut candidates = self.candidates(req).await?;
        if candidates.is_empty() {
            return Err(VerifyError::NoGatewayAvailable {
                farm_id: req.farm_id,
            });
        }

        let picked = candidates.swap_remove(self.names.index(candidates.len()));
        info!(
            node_id = picked.node_id,
            domain = picked.domain().unwrap_or_default(),
            "Selected gateway node"
        );
        Ok(picked)
    }

    /// First eligible node that answers the liveness probe
    pub async fn select_workload_node(&self, req: &ResourceRequest) -> VerifyResult<NodeCandidate> {
        for candidate in self.candidates(req).await? {
            match self.grid.is_node_online(candidate.node_id).await {
                Ok(true) => {
                    info!(node_id = candidate.node_id, "Selected workload node");
                    return Ok(candidate);
                }
                Ok(false) => debug!(node_id = candidate.node_id, "Node is offline, skipping"),
                Err(e) => warn!(
                    node_id = candidate.node_id,
                    error = %e,
                    "Liveness probe failed, treating node as offline"
                ),
            }
        }

        Err(VerifyError::NoNodeAvailable {
            farm_id: req.farm_id,
        })
    }
}
