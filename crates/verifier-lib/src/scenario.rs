//! Scenario definition and per-run plans
//!
//! A [`ScenarioConfig`] describes what to deploy; a [`RunPlan`] fixes the
//! randomized names and network range for one run before anything touches
//! the grid, so cleanup knows what to delete no matter where a run stops.

use crate::models::{
    gateway_domain, DiskSpec, FarmId, GatewayDescriptor, MachineSpec, NetworkSpec, NodeId,
    ResourceRequest, TwinId, WorkloadDescriptor,
};
use crate::naming::{prefixed, NameGenerator};
use crate::network::random_private_range;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder substituted with the gateway domain in env values
pub const DOMAIN_PLACEHOLDER: &str = "{domain}";

const NAME_SUFFIX_LEN: usize = 10;
const COMPONENT_NAME_LEN: usize = 15;

/// What a verification run deploys and what it expects to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Solution label, also the project scope prefix
    pub solution: String,
    pub farm_id: FarmId,
    pub gateway_farm_id: FarmId,
    pub cpu: u32,
    pub memory_gb: u64,
    pub rootfs_gb: u64,
    pub disk_gb: u64,
    pub mountpoint: String,
    pub flist: String,
    pub entrypoint: String,
    pub public_ip: bool,
    pub planetary: bool,
    pub mycelium: bool,
    pub env: BTreeMap<String, String>,
    pub metadata: String,
    pub description: String,
    /// Port the workload serves on behind the gateway
    pub backend_port: u16,
    pub tls_passthrough: bool,
    /// Marker the public page must contain once it is up
    pub expected_fragment: String,
    pub workload_prefix: String,
    pub gateway_prefix: String,
}

impl ScenarioConfig {
    /// PeerTube on a 1 vCPU / 2 GB VM with a 15 GB data disk
    pub fn peertube(ssh_key: impl Into<String>) -> Self {
        let mut env = BTreeMap::new();
        env.insert("SSH_KEY".to_string(), ssh_key.into());
        env.insert(
            "PEERTUBE_WEBSERVER_HOSTNAME".to_string(),
            DOMAIN_PLACEHOLDER.to_string(),
        );
        env.insert(
            "PEERTUBE_ADMIN_EMAIL".to_string(),
            "admin123@peer.tube".to_string(),
        );
        env.insert(
            "PT_INITIAL_ROOT_PASSWORD".to_string(),
            "admin123".to_string(),
        );

        Self {
            solution: "peertube".to_string(),
            farm_id: 1,
            gateway_farm_id: 1,
            cpu: 1,
            memory_gb: 2,
            rootfs_gb: 2,
            disk_gb: 15,
            mountpoint: "/data".to_string(),
            flist: "https://hub.grid.tf/tf-official-apps/peertube-v3.1.1.flist".to_string(),
            entrypoint: "/sbin/zinit init".to_string(),
            public_ip: false,
            planetary: true,
            mycelium: false,
            env,
            metadata: "{'deploymentType': 'peertube'}".to_string(),
            description: "test deploying Peertube via grid verifier".to_string(),
            backend_port: 9000,
            tls_passthrough: false,
            expected_fragment:
                "PeerTube, an ActivityPub-federated video streaming platform using P2P directly in your web browser."
                    .to_string(),
            workload_prefix: "pt".to_string(),
            gateway_prefix: "gw".to_string(),
        }
    }

    pub fn memory_mb(&self) -> u64 {
        self.memory_gb * 1024
    }
}

/// Names and network fixed for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub config: ScenarioConfig,
    pub deployment_name: String,
    pub network_name: String,
    pub vm_name: String,
    pub disk_name: String,
    pub gateway_name: String,
    pub ip_range: Ipv4Net,
}

impl RunPlan {
    pub fn generate(config: ScenarioConfig, names: &dyn NameGenerator) -> Self {
        Self {
            deployment_name: prefixed(names, &config.workload_prefix, NAME_SUFFIX_LEN),
            network_name: names.alphanumeric(COMPONENT_NAME_LEN),
            vm_name: names.alphanumeric(COMPONENT_NAME_LEN),
            disk_name: names.alphanumeric(COMPONENT_NAME_LEN),
            // Gateway names end up in DNS labels
            gateway_name: prefixed(names, &config.gateway_prefix, NAME_SUFFIX_LEN).to_lowercase(),
            ip_range: random_private_range(names),
            config,
        }
    }

    /// Project scope for this run, e.g. `peertube/ptXXXXXXXXXX`
    pub fn project(&self) -> String {
        format!("{}/{}", self.config.solution, self.deployment_name)
    }

    pub fn resource_request(&self, requester: TwinId) -> ResourceRequest {
        ResourceRequest::workload(
            self.config.cpu,
            self.config.memory_mb(),
            self.config.rootfs_gb,
            self.config.disk_gb,
            self.config.farm_id,
            requester,
        )
    }

    pub fn gateway_request(&self, requester: TwinId) -> ResourceRequest {
        ResourceRequest::gateway(self.config.gateway_farm_id, requester)
    }

    pub fn domain(&self, public_domain: &str) -> String {
        gateway_domain(&self.gateway_name, public_domain)
    }

    /// Workload descriptor for the chosen node; env values get the domain filled in
    pub fn workload(&self, node_id: NodeId, domain: &str) -> WorkloadDescriptor {
        let env = self
            .config
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.replace(DOMAIN_PLACEHOLDER, domain)))
            .collect();

        let disks = if self.config.disk_gb > 0 {
            vec![DiskSpec {
                name: self.disk_name.clone(),
                size_gb: self.config.disk_gb,
                mountpoint: self.config.mountpoint.clone(),
            }]
        } else {
            Vec::new()
        };

        WorkloadDescriptor {
            name: self.deployment_name.clone(),
            network: NetworkSpec {
                name: self.network_name.clone(),
                ip_range: self.ip_range,
            },
            machine: MachineSpec {
                name: self.vm_name.clone(),
                node_id,
                cpu: self.config.cpu,
                memory_mb: self.config.memory_mb(),
                rootfs_size_gb: self.config.rootfs_gb,
                disks,
                flist: self.config.flist.clone(),
                entrypoint: self.config.entrypoint.clone(),
                public_ip: self.config.public_ip,
                planetary: self.config.planetary,
                mycelium: self.config.mycelium,
                env,
            },
            metadata: self.config.metadata.clone(),
            description: self.config.description.clone(),
        }
    }

    pub fn gateway(&self, node_id: NodeId, backends: Vec<String>) -> GatewayDescriptor {
        GatewayDescriptor {
            name: self.gateway_name.clone(),
            node_id,
            tls_passthrough: self.config.tls_passthrough,
            backends,
        }
    }

    pub fn workload_names(&self) -> Vec<String> {
        vec![self.deployment_name.clone()]
    }

    pub fn gateway_names(&self) -> Vec<String> {
        vec![self.gateway_name.clone()]
    }
}
