//! Test doubles: in-memory grid, scripted probe and a recording clock

use crate::grid::{async_trait, GridClient, GridResult};
use crate::models::{
    CapacityView, Contract, ContractDelta, ContractType, DeployedGatewayView,
    DeployedWorkloadView, DeploymentStatus, GatewayDescriptor, InterfaceView, MountView,
    NodeCandidate, NodeCapacity, NodeFilter, NodeId, PublicConfig, TwinId, WorkloadDescriptor,
};
use crate::network::gb_to_bytes;
use crate::reachability::{HttpProbe, ProbeError, ProbeResponse};
use crate::retry::Sleeper;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;

/// Fake clock: records requested sleeps and yields once instead of waiting
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Probe that replays a script, repeating the fallback once it runs out
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<ProbeResponse, ProbeError>>>,
    fallback: Result<ProbeResponse, ProbeError>,
    calls: Mutex<u32>,
    last_accept: Mutex<Option<String>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<Result<ProbeResponse, ProbeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Err(ProbeError::Transport("script exhausted".to_string())),
            calls: Mutex::new(0),
            last_accept: Mutex::new(None),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: Result<ProbeResponse, ProbeError>) -> Self {
        let mut probe = Self::new(Vec::new());
        probe.fallback = response;
        probe
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    pub fn last_accept(&self) -> Option<String> {
        self.last_accept.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpProbe for ScriptedProbe {
    async fn get(&self, url: &str, accept: &str) -> Result<ProbeResponse, ProbeError> {
        *self.calls.lock().unwrap() += 1;
        *self.last_accept.lock().unwrap() = Some(accept.to_string());
        self.urls.lock().unwrap().push(url.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Ways the fake grid can misreport state
#[derive(Debug, Clone, Default)]
pub struct Tampering {
    pub extra_created_contract: bool,
    pub workload_status: Option<DeploymentStatus>,
    pub mount_size_offset_bytes: u64,
    pub assign_public_ip: bool,
    pub ip_outside_range: bool,
    pub gateway_contract_node: Option<NodeId>,
    pub omit_deleted_field: bool,
    pub hide_from_list: bool,
}

#[derive(Default)]
struct GridState {
    workloads: BTreeMap<String, (WorkloadDescriptor, Contract)>,
    gateways: BTreeMap<String, (GatewayDescriptor, Contract)>,
    next_contract: u64,
    calls: Vec<String>,
}

/// In-memory grid with a fixed node inventory
pub struct FakeGrid {
    nodes: Vec<NodeCandidate>,
    offline: HashSet<NodeId>,
    tampering: Mutex<Tampering>,
    state: Mutex<GridState>,
}

pub const FAKE_TWIN: TwinId = 42;

impl FakeGrid {
    pub fn new(nodes: Vec<NodeCandidate>) -> Self {
        Self {
            nodes,
            offline: HashSet::new(),
            tampering: Mutex::new(Tampering::default()),
            state: Mutex::new(GridState {
                next_contract: 1000,
                ..GridState::default()
            }),
        }
    }

    /// One gateway node (id 1) and two compute nodes (ids 10, 11) in farm 1
    pub fn standard() -> Self {
        Self::new(vec![
            gateway_node(1, 1, "gent01.grid.example"),
            compute_node(10, 1, 8, 16_384, 500),
            compute_node(11, 1, 8, 16_384, 500),
        ])
    }

    pub fn with_offline(mut self, node_id: NodeId) -> Self {
        self.offline.insert(node_id);
        self
    }

    pub fn tamper(&self, f: impl FnOnce(&mut Tampering)) {
        f(&mut self.tampering.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn workload_names(&self) -> Vec<String> {
        self.state.lock().unwrap().workloads.keys().cloned().collect()
    }

    pub fn gateway_names(&self) -> Vec<String> {
        self.state.lock().unwrap().gateways.keys().cloned().collect()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn node(&self, node_id: NodeId) -> Option<&NodeCandidate> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    fn workload_view(&self, descriptor: &WorkloadDescriptor) -> DeployedWorkloadView {
        let tampering = self.tampering.lock().unwrap().clone();
        let machine = &descriptor.machine;
        let net = descriptor.network.ip_range.network().octets();
        let ip = if tampering.ip_outside_range {
            Ipv4Addr::new(net[0], net[1].wrapping_add(1), 2, 2)
        } else {
            Ipv4Addr::new(net[0], net[1], 2, 2)
        };

        DeployedWorkloadView {
            name: machine.name.clone(),
            node_id: machine.node_id,
            status: tampering.workload_status.unwrap_or(DeploymentStatus::Ok),
            flist: machine.flist.clone(),
            entrypoint: machine.entrypoint.clone(),
            mounts: machine
                .disks
                .iter()
                .map(|d| MountView {
                    name: d.name.clone(),
                    size_bytes: gb_to_bytes(d.size_gb) + tampering.mount_size_offset_bytes,
                    mount_point: d.mountpoint.clone(),
                    state: DeploymentStatus::Ok,
                })
                .collect(),
            interfaces: vec![InterfaceView {
                network: descriptor.network.name.clone(),
                ip,
            }],
            capacity: CapacityView {
                cpu: machine.cpu,
                memory_mb: machine.memory_mb,
            },
            rootfs_size_bytes: gb_to_bytes(machine.rootfs_size_gb),
            planetary: machine
                .planetary
                .then(|| format!("300:1234:5678::{:x}", machine.node_id)),
            mycelium: machine.mycelium.then(|| "4ab:cd::1".to_string()),
            public_ip: (machine.public_ip || tampering.assign_public_ip)
                .then(|| "185.69.166.10/24".to_string()),
            description: descriptor.description.clone(),
        }
    }

    fn gateway_view(&self, descriptor: &GatewayDescriptor) -> DeployedGatewayView {
        let domain = self
            .node(descriptor.node_id)
            .and_then(|n| n.domain())
            .map(|d| descriptor.domain(d))
            .unwrap_or_default();

        DeployedGatewayView {
            name: descriptor.name.clone(),
            node_id: descriptor.node_id,
            status: DeploymentStatus::Ok,
            kind: "gateway-name-proxy".to_string(),
            domain,
            tls_passthrough: descriptor.tls_passthrough,
            backends: descriptor.backends.clone(),
        }
    }

    fn deletion(&self, removed: Option<Contract>) -> ContractDelta {
        let omit = self.tampering.lock().unwrap().omit_deleted_field;
        ContractDelta {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: if omit {
                None
            } else {
                Some(removed.into_iter().collect())
            },
        }
    }
}

pub fn gateway_node(node_id: NodeId, farm_id: u32, domain: &str) -> NodeCandidate {
    NodeCandidate {
        node_id,
        farm_id,
        public_config: Some(PublicConfig {
            domain: Some(domain.to_string()),
        }),
        // Too small to host the standard scenario's workload
        capacity: NodeCapacity {
            cpu: 1,
            memory_mb: 1024,
            storage_gb: 10,
        },
        gateway: true,
    }
}

pub fn compute_node(
    node_id: NodeId,
    farm_id: u32,
    cpu: u32,
    memory_mb: u64,
    storage_gb: u64,
) -> NodeCandidate {
    NodeCandidate {
        node_id,
        farm_id,
        public_config: None,
        capacity: NodeCapacity {
            cpu,
            memory_mb,
            storage_gb,
        },
        gateway: false,
    }
}

#[async_trait]
impl GridClient for FakeGrid {
    async fn twin_id(&self) -> GridResult<TwinId> {
        Ok(FAKE_TWIN)
    }

    async fn filter_nodes(&self, filter: &NodeFilter) -> GridResult<Vec<NodeCandidate>> {
        self.record("filter_nodes".to_string());
        // Loose server-side filter; capacity is left for the caller to check
        Ok(self
            .nodes
            .iter()
            .filter(|n| filter.farm_id.map_or(true, |f| n.farm_id == f))
            .filter(|n| filter.gateway != Some(true) || n.gateway)
            .cloned()
            .collect())
    }

    async fn is_node_online(&self, node_id: NodeId) -> GridResult<bool> {
        Ok(!self.offline.contains(&node_id))
    }

    async fn deploy_workload(&self, workload: &WorkloadDescriptor) -> GridResult<ContractDelta> {
        let extra = self.tampering.lock().unwrap().extra_created_contract;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("deploy_workload:{}", workload.name));
        state.next_contract += 1;
        let contract = Contract {
            contract_id: state.next_contract,
            contract_type: ContractType::Node {
                node_id: workload.machine.node_id,
            },
        };
        state
            .workloads
            .insert(workload.name.clone(), (workload.clone(), contract.clone()));

        let mut created = vec![contract];
        if extra {
            created.push(Contract {
                contract_id: state.next_contract + 500,
                contract_type: ContractType::Name {
                    name: "stray".to_string(),
                },
            });
        }
        Ok(ContractDelta {
            created,
            updated: Vec::new(),
            deleted: Some(Vec::new()),
        })
    }

    async fn deploy_gateway(&self, gateway: &GatewayDescriptor) -> GridResult<ContractDelta> {
        let node_override = self.tampering.lock().unwrap().gateway_contract_node;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("deploy_gateway:{}", gateway.name));
        state.next_contract += 1;
        let contract = Contract {
            contract_id: state.next_contract,
            contract_type: ContractType::Node {
                node_id: node_override.unwrap_or(gateway.node_id),
            },
        };
        state
            .gateways
            .insert(gateway.name.clone(), (gateway.clone(), contract.clone()));

        Ok(ContractDelta {
            created: vec![contract],
            updated: Vec::new(),
            deleted: Some(Vec::new()),
        })
    }

    async fn list_workloads(&self) -> GridResult<Vec<String>> {
        if self.tampering.lock().unwrap().hide_from_list {
            return Ok(Vec::new());
        }
        Ok(self.workload_names())
    }

    async fn list_gateways(&self) -> GridResult<Vec<String>> {
        Ok(self.gateway_names())
    }

    async fn get_workload(&self, name: &str) -> GridResult<Vec<DeployedWorkloadView>> {
        let descriptor = self
            .state
            .lock()
            .unwrap()
            .workloads
            .get(name)
            .map(|(d, _)| d.clone());
        Ok(descriptor
            .map(|d| vec![self.workload_view(&d)])
            .unwrap_or_default())
    }

    async fn get_gateway(&self, name: &str) -> GridResult<Vec<DeployedGatewayView>> {
        let descriptor = self
            .state
            .lock()
            .unwrap()
            .gateways
            .get(name)
            .map(|(d, _)| d.clone());
        Ok(descriptor
            .map(|d| vec![self.gateway_view(&d)])
            .unwrap_or_default())
    }

    async fn delete_workload(&self, name: &str) -> GridResult<ContractDelta> {
        let removed = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("delete_workload:{name}"));
            state.workloads.remove(name).map(|(_, c)| c)
        };
        Ok(self.deletion(removed))
    }

    async fn delete_gateway(&self, name: &str) -> GridResult<ContractDelta> {
        let removed = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("delete_gateway:{name}"));
            state.gateways.remove(name).map(|(_, c)| c)
        };
        Ok(self.deletion(removed))
    }
}
