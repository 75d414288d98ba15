//! Core data models for grid deployments

use crate::error::{VerifyError, VerifyResult};
use crate::network::is_private_range;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;

pub type NodeId = u32;
pub type TwinId = u32;
pub type FarmId = u32;

/// Resources a deployment needs from a node
///
/// Built once per run and only used to query candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub cpu_cores: u32,
    pub memory_mb: u64,
    pub root_fs_gb: u64,
    pub extra_disk_gb: u64,
    pub farm_id: FarmId,
    pub requires_gateway: bool,
    pub requester: TwinId,
}

impl ResourceRequest {
    /// Request for a compute workload
    pub fn workload(
        cpu_cores: u32,
        memory_mb: u64,
        root_fs_gb: u64,
        extra_disk_gb: u64,
        farm_id: FarmId,
        requester: TwinId,
    ) -> Self {
        Self {
            cpu_cores,
            memory_mb,
            root_fs_gb,
            extra_disk_gb,
            farm_id,
            requires_gateway: false,
            requester,
        }
    }

    /// Request for a gateway-capable node; no compute is reserved
    pub fn gateway(farm_id: FarmId, requester: TwinId) -> Self {
        Self {
            cpu_cores: 0,
            memory_mb: 0,
            root_fs_gb: 0,
            extra_disk_gb: 0,
            farm_id,
            requires_gateway: true,
            requester,
        }
    }

    /// Total SSD storage needed (rootfs plus attached disks)
    pub fn storage_gb(&self) -> u64 {
        self.root_fs_gb + self.extra_disk_gb
    }

    /// Filter criteria to send to the grid
    pub fn to_filter(&self) -> NodeFilter {
        if self.requires_gateway {
            return NodeFilter {
                gateway: Some(true),
                farm_id: Some(self.farm_id),
                available_for: Some(self.requester),
                ..NodeFilter::default()
            };
        }
        NodeFilter {
            cru: Some(self.cpu_cores),
            mru_mb: Some(self.memory_mb),
            sru_gb: Some(self.storage_gb()),
            farm_id: Some(self.farm_id),
            gateway: None,
            available_for: Some(self.requester),
        }
    }
}

/// Node query criteria understood by the grid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cru: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mru_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sru_gb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_id: Option<FarmId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_for: Option<TwinId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicConfig {
    pub domain: Option<String>,
}

/// Free capacity advertised by a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub cpu: u32,
    pub memory_mb: u64,
    pub storage_gb: u64,
}

/// A node returned by a capacity query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCandidate {
    pub node_id: NodeId,
    pub farm_id: FarmId,
    #[serde(default)]
    pub public_config: Option<PublicConfig>,
    #[serde(default)]
    pub capacity: NodeCapacity,
    #[serde(default)]
    pub gateway: bool,
}

impl NodeCandidate {
    /// Public domain, if the node has one configured
    pub fn domain(&self) -> Option<&str> {
        self.public_config
            .as_ref()
            .and_then(|c| c.domain.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// Whether this node can host the request in every dimension
    pub fn satisfies(&self, req: &ResourceRequest) -> bool {
        if self.farm_id != req.farm_id {
            return false;
        }
        if req.requires_gateway && (!self.gateway || self.domain().is_none()) {
            return false;
        }
        self.capacity.cpu >= req.cpu_cores
            && self.capacity.memory_mb >= req.memory_mb
            && self.capacity.storage_gb >= req.storage_gb()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpec {
    pub name: String,
    pub size_gb: u64,
    pub mountpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub ip_range: Ipv4Net,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub name: String,
    pub node_id: NodeId,
    pub cpu: u32,
    pub memory_mb: u64,
    pub rootfs_size_gb: u64,
    pub disks: Vec<DiskSpec>,
    /// Image reference URI
    pub flist: String,
    pub entrypoint: String,
    pub public_ip: bool,
    pub planetary: bool,
    pub mycelium: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Compute workload submitted to the grid: one VM on one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    pub name: String,
    pub network: NetworkSpec,
    pub machine: MachineSpec,
    pub metadata: String,
    pub description: String,
}

impl WorkloadDescriptor {
    pub fn validate(&self) -> VerifyResult<()> {
        if self.name.is_empty() || self.machine.name.is_empty() || self.network.name.is_empty() {
            return Err(VerifyError::invalid("workload, machine and network names must be set"));
        }
        if !is_private_range(&self.network.ip_range) {
            return Err(VerifyError::invalid(format!(
                "ip range {} is not an RFC1918 private block",
                self.network.ip_range
            )));
        }

        let mut mountpoints = HashSet::new();
        let mut disk_names = HashSet::new();
        for disk in &self.machine.disks {
            if !mountpoints.insert(disk.mountpoint.as_str()) {
                return Err(VerifyError::invalid(format!(
                    "duplicate mountpoint {}",
                    disk.mountpoint
                )));
            }
            if !disk_names.insert(disk.name.as_str()) {
                return Err(VerifyError::invalid(format!("duplicate disk name {}", disk.name)));
            }
        }
        Ok(())
    }
}

/// Name-based reverse proxy exposing `<name>.<node domain>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayDescriptor {
    pub name: String,
    pub node_id: NodeId,
    pub tls_passthrough: bool,
    /// Order matters: the read-back must return the same sequence
    pub backends: Vec<String>,
}

impl GatewayDescriptor {
    pub fn validate(&self) -> VerifyResult<()> {
        if self.name.is_empty() {
            return Err(VerifyError::invalid("gateway name must be set"));
        }
        if self.backends.is_empty() {
            return Err(VerifyError::invalid("gateway needs at least one backend"));
        }
        Ok(())
    }

    /// Fully qualified domain on a node with the given public domain
    pub fn domain(&self, public_domain: &str) -> String {
        gateway_domain(&self.name, public_domain)
    }
}

pub fn gateway_domain(name: &str, public_domain: &str) -> String {
    format!("{}.{}", name, public_domain)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContractType {
    Node { node_id: NodeId },
    Name { name: String },
    Rent { node_id: NodeId },
}

/// Billing/ownership record touched by a deploy or delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: u64,
    pub contract_type: ContractType,
}

impl Contract {
    pub fn node_id(&self) -> Option<NodeId> {
        match self.contract_type {
            ContractType::Node { node_id } | ContractType::Rent { node_id } => Some(node_id),
            ContractType::Name { .. } => None,
        }
    }
}

/// Contracts created, updated and deleted by one grid operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDelta {
    #[serde(default)]
    pub created: Vec<Contract>,
    #[serde(default)]
    pub updated: Vec<Contract>,
    /// Absent when the grid did not report deletions at all
    #[serde(default)]
    pub deleted: Option<Vec<Contract>>,
}

impl ContractDelta {
    pub fn deleted(&self) -> &[Contract] {
        self.deleted.as_deref().unwrap_or_default()
    }

    /// Delta of a delete whose target no longer exists
    pub fn empty_deletion() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Some(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Ok,
    Error,
    Deploying,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentStatus::Ok => write!(f, "ok"),
            DeploymentStatus::Error => write!(f, "error"),
            DeploymentStatus::Deploying => write!(f, "deploying"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountView {
    pub name: String,
    pub size_bytes: u64,
    pub mount_point: String,
    pub state: DeploymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceView {
    pub network: String,
    pub ip: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityView {
    pub cpu: u32,
    pub memory_mb: u64,
}

/// What the grid reports for a deployed workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedWorkloadView {
    pub name: String,
    pub node_id: NodeId,
    pub status: DeploymentStatus,
    pub flist: String,
    pub entrypoint: String,
    #[serde(default)]
    pub mounts: Vec<MountView>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceView>,
    pub capacity: CapacityView,
    pub rootfs_size_bytes: u64,
    #[serde(default)]
    pub planetary: Option<String>,
    #[serde(default)]
    pub mycelium: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// What the grid reports for a deployed name gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedGatewayView {
    pub name: String,
    pub node_id: NodeId,
    pub status: DeploymentStatus,
    /// Workload type, e.g. `gateway-name-proxy`
    #[serde(rename = "type")]
    pub kind: String,
    pub domain: String,
    pub tls_passthrough: bool,
    #[serde(default)]
    pub backends: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(cpu: u32, memory_mb: u64, storage_gb: u64) -> NodeCandidate {
        NodeCandidate {
            node_id: 11,
            farm_id: 1,
            public_config: None,
            capacity: NodeCapacity {
                cpu,
                memory_mb,
                storage_gb,
            },
            gateway: false,
        }
    }

    fn workload() -> WorkloadDescriptor {
        WorkloadDescriptor {
            name: "ptabc".to_string(),
            network: NetworkSpec {
                name: "net1".to_string(),
                ip_range: "10.20.0.0/16".parse().unwrap(),
            },
            machine: MachineSpec {
                name: "vm1".to_string(),
                node_id: 11,
                cpu: 1,
                memory_mb: 2048,
                rootfs_size_gb: 2,
                disks: vec![DiskSpec {
                    name: "disk1".to_string(),
                    size_gb: 15,
                    mountpoint: "/data".to_string(),
                }],
                flist: "https://hub.example/app.flist".to_string(),
                entrypoint: "/sbin/zinit init".to_string(),
                public_ip: false,
                planetary: true,
                mycelium: false,
                env: BTreeMap::new(),
            },
            metadata: String::new(),
            description: "test".to_string(),
        }
    }

    #[test]
    fn test_workload_filter_sums_storage() {
        let req = ResourceRequest::workload(1, 2048, 2, 15, 1, 42);
        let filter = req.to_filter();

        assert_eq!(filter.cru, Some(1));
        assert_eq!(filter.mru_mb, Some(2048));
        assert_eq!(filter.sru_gb, Some(17));
        assert_eq!(filter.gateway, None);
        assert_eq!(filter.available_for, Some(42));
    }

    #[test]
    fn test_gateway_filter_only_asks_for_gateway() {
        let filter = ResourceRequest::gateway(1, 42).to_filter();

        assert_eq!(filter.gateway, Some(true));
        assert_eq!(filter.cru, None);
        assert_eq!(filter.sru_gb, None);
        let json = serde_json::to_value(&filter).unwrap();
        assert!(json.get("cru").is_none());
    }

    #[test]
    fn test_satisfies_checks_every_dimension() {
        let req = ResourceRequest::workload(1, 2048, 2, 15, 1, 42);

        assert!(candidate(1, 2048, 17).satisfies(&req));
        assert!(!candidate(0, 4096, 100).satisfies(&req));
        assert!(!candidate(4, 1024, 100).satisfies(&req));
        assert!(!candidate(4, 4096, 16).satisfies(&req));

        let mut other_farm = candidate(8, 8192, 500);
        other_farm.farm_id = 2;
        assert!(!other_farm.satisfies(&req));
    }

    #[test]
    fn test_gateway_candidate_needs_domain() {
        let req = ResourceRequest::gateway(1, 42);
        let mut node = candidate(0, 0, 0);
        node.gateway = true;
        assert!(!node.satisfies(&req));

        node.public_config = Some(PublicConfig {
            domain: Some(String::new()),
        });
        assert!(!node.satisfies(&req));

        node.public_config = Some(PublicConfig {
            domain: Some("gent01.grid.example".to_string()),
        });
        assert!(node.satisfies(&req));
    }

    #[test]
    fn test_workload_validation() {
        assert!(workload().validate().is_ok());

        let mut public = workload();
        public.network.ip_range = "44.0.0.0/16".parse().unwrap();
        assert!(matches!(
            public.validate(),
            Err(VerifyError::InvalidDescriptor(_))
        ));

        let mut dup = workload();
        dup.machine.disks.push(DiskSpec {
            name: "disk2".to_string(),
            size_gb: 1,
            mountpoint: "/data".to_string(),
        });
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_gateway_validation_and_domain() {
        let mut gw = GatewayDescriptor {
            name: "gwabc".to_string(),
            node_id: 3,
            tls_passthrough: false,
            backends: vec![],
        };
        assert!(gw.validate().is_err());

        gw.backends.push("http://[300::1]:9000".to_string());
        assert!(gw.validate().is_ok());
        assert_eq!(gw.domain("gent01.grid.example"), "gwabc.gent01.grid.example");
    }

    #[test]
    fn test_contract_delta_wire_format() {
        let delta: ContractDelta = serde_json::from_str(
            r#"{"created":[{"contract_id":7,"contract_type":{"type":"node","node_id":3}}]}"#,
        )
        .unwrap();

        assert_eq!(delta.created.len(), 1);
        assert_eq!(delta.created[0].node_id(), Some(3));
        assert!(delta.updated.is_empty());
        assert!(delta.deleted.is_none());
        assert!(delta.deleted().is_empty());
    }

    #[test]
    fn test_gateway_view_type_field() {
        let view: DeployedGatewayView = serde_json::from_str(
            r#"{"name":"gw1","node_id":3,"status":"ok","type":"gateway-name-proxy",
                "domain":"gw1.example","tls_passthrough":false,"backends":["http://[::1]:9000"]}"#,
        )
        .unwrap();

        assert_eq!(view.kind, "gateway-name-proxy");
        assert_eq!(view.status, DeploymentStatus::Ok);
    }
}
