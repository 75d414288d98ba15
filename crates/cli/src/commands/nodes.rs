//! Node listing command

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use tabled::Tabled;
use verifier_lib::{NodeCandidate, NodeSelector, RandomNames, ResourceRequest, TwinId};

use crate::client::Connection;
use crate::output::{format_bytes, print_json, print_table, yes_no, OutputFormat};

pub struct NodeQuery {
    pub farm_id: u32,
    pub cpu: u32,
    pub memory_mb: u64,
    pub rootfs_gb: u64,
    pub disk_gb: u64,
    pub gateway: bool,
}

impl NodeQuery {
    fn request(&self, twin: TwinId) -> ResourceRequest {
        if self.gateway {
            ResourceRequest::gateway(self.farm_id, twin)
        } else {
            ResourceRequest::workload(
                self.cpu,
                self.memory_mb,
                self.rootfs_gb,
                self.disk_gb,
                self.farm_id,
                twin,
            )
        }
    }
}

/// Row for nodes table
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    node_id: u32,
    #[tabled(rename = "Farm")]
    farm_id: u32,
    #[tabled(rename = "CPU")]
    cpu: u32,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Storage")]
    storage: String,
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "Domain")]
    domain: String,
}

impl From<&NodeCandidate> for NodeRow {
    fn from(node: &NodeCandidate) -> Self {
        Self {
            node_id: node.node_id,
            farm_id: node.farm_id,
            cpu: node.capacity.cpu,
            memory: format_bytes(node.capacity.memory_mb * 1024 * 1024),
            storage: format!("{} GB", node.capacity.storage_gb),
            gateway: yes_no(node.gateway),
            domain: node.domain().unwrap_or("-").to_string(),
        }
    }
}

/// List nodes able to host the query
pub async fn list_nodes(connection: &Connection, query: NodeQuery, format: OutputFormat) -> Result<()> {
    let grid = connection.client()?;
    let twin = grid.twin_id().await.context("Failed to resolve twin id")?;
    let request = query.request(twin);

    let selector = NodeSelector::new(grid, Arc::new(RandomNames::from_entropy()));
    let nodes = selector
        .candidates(&request)
        .await
        .context("Failed to query nodes")?;

    match format {
        OutputFormat::Json => print_json(&nodes)?,
        OutputFormat::Table => {
            let kind = if query.gateway { "gateway" } else { "workload" };
            println!(
                "{} {} nodes in farm {}",
                nodes.len().to_string().bold(),
                kind,
                query.farm_id
            );
            let rows: Vec<NodeRow> = nodes.iter().map(NodeRow::from).collect();
            print_table(&rows);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_query_builds_storage_request() {
        let query = NodeQuery {
            farm_id: 1,
            cpu: 2,
            memory_mb: 4096,
            rootfs_gb: 2,
            disk_gb: 15,
            gateway: false,
        };

        let request = query.request(42);

        assert_eq!(request.storage_gb(), 17);
        assert!(!request.requires_gateway);
        assert_eq!(request.requester, 42);
    }

    #[test]
    fn test_gateway_query() {
        let query = NodeQuery {
            farm_id: 3,
            cpu: 1,
            memory_mb: 2048,
            rootfs_gb: 2,
            disk_gb: 15,
            gateway: true,
        };

        let request = query.request(42);

        assert!(request.requires_gateway);
        assert_eq!(request.farm_id, 3);
    }
}
