//! Grid capability interface
//!
//! The verifier never talks to the grid directly. Everything it needs
//! (capacity queries, node liveness, deploy/read/delete of workloads and
//! name gateways) goes through [`GridClient`], so tests can substitute an
//! in-memory grid and production uses [`HttpGridClient`].

mod http;

pub use http::{GridClientConfig, HttpGridClient, HttpGridClientBuilder, PROJECT_HEADER};

use crate::error::GridError;
use crate::models::{
    ContractDelta, DeployedGatewayView, DeployedWorkloadView, GatewayDescriptor, NodeCandidate,
    NodeFilter, NodeId, TwinId, WorkloadDescriptor,
};

pub use async_trait::async_trait;

pub type GridResult<T> = Result<T, GridError>;

/// Operations the verifier needs from the grid
#[async_trait]
pub trait GridClient: Send + Sync {
    /// Twin identity the deployments are made under
    async fn twin_id(&self) -> GridResult<TwinId>;

    /// Candidate nodes matching the filter
    async fn filter_nodes(&self, filter: &NodeFilter) -> GridResult<Vec<NodeCandidate>>;

    /// Liveness probe on a node
    async fn is_node_online(&self, node_id: NodeId) -> GridResult<bool>;

    async fn deploy_workload(&self, workload: &WorkloadDescriptor) -> GridResult<ContractDelta>;

    async fn deploy_gateway(&self, gateway: &GatewayDescriptor) -> GridResult<ContractDelta>;

    /// Names of workloads in the current project scope
    async fn list_workloads(&self) -> GridResult<Vec<String>>;

    /// Names of name gateways in the current project scope
    async fn list_gateways(&self) -> GridResult<Vec<String>>;

    async fn get_workload(&self, name: &str) -> GridResult<Vec<DeployedWorkloadView>>;

    async fn get_gateway(&self, name: &str) -> GridResult<Vec<DeployedGatewayView>>;

    /// Delete a workload; deleting an absent name is not an error
    async fn delete_workload(&self, name: &str) -> GridResult<ContractDelta>;

    /// Delete a name gateway; deleting an absent name is not an error
    async fn delete_gateway(&self, name: &str) -> GridResult<ContractDelta>;
}
