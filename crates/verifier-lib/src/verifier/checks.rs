//! Comparisons between requested and observed deployment state

use crate::error::{VerifyError, VerifyResult};
use crate::models::{
    Contract, ContractDelta, DeployedGatewayView, DeployedWorkloadView, DeploymentStatus,
    GatewayDescriptor, NodeId, WorkloadDescriptor,
};
use crate::network::{bytes_to_gb, gb_to_bytes, is_private_member};
use std::fmt::Debug;
use std::net::Ipv6Addr;

fn ensure_eq<T: PartialEq + Debug>(field: &str, expected: T, observed: T) -> VerifyResult<()> {
    if expected == observed {
        Ok(())
    } else {
        Err(VerifyError::mismatch(field, expected, observed))
    }
}

/// A deploy must create exactly one contract and touch nothing else
pub fn expect_single_creation<'a>(
    operation: &'static str,
    delta: &'a ContractDelta,
) -> VerifyResult<&'a Contract> {
    if delta.created.len() != 1 || !delta.updated.is_empty() || !delta.deleted().is_empty() {
        return Err(VerifyError::contract_shape(
            operation,
            format!(
                "expected 1 created, 0 updated, 0 deleted; got {} created, {} updated, {} deleted",
                delta.created.len(),
                delta.updated.len(),
                delta.deleted().len()
            ),
        ));
    }
    Ok(&delta.created[0])
}

/// A delete may only remove contracts, and must say what it removed
pub fn expect_deletion_only(operation: &'static str, delta: &ContractDelta) -> VerifyResult<usize> {
    if !delta.created.is_empty() || !delta.updated.is_empty() {
        return Err(VerifyError::contract_shape(
            operation,
            format!(
                "delete produced {} created and {} updated contracts",
                delta.created.len(),
                delta.updated.len()
            ),
        ));
    }
    match &delta.deleted {
        Some(deleted) => Ok(deleted.len()),
        None => Err(VerifyError::contract_shape(
            operation,
            "deleted contracts were not reported",
        )),
    }
}

pub fn expect_contract_on_node(
    operation: &'static str,
    contract: &Contract,
    node_id: NodeId,
) -> VerifyResult<()> {
    match contract.node_id() {
        Some(id) if id == node_id => Ok(()),
        other => Err(VerifyError::contract_shape(
            operation,
            format!(
                "contract {} is on node {:?}, expected node {}",
                contract.contract_id, other, node_id
            ),
        )),
    }
}

/// Exactly one view for a name read-back
pub fn single_view<'a, T>(field: &str, views: &'a [T]) -> VerifyResult<&'a T> {
    match views {
        [view] => Ok(view),
        _ => Err(VerifyError::mismatch(format!("{field}.count"), 1, views.len())),
    }
}

pub fn check_workload(view: &DeployedWorkloadView, requested: &WorkloadDescriptor) -> VerifyResult<()> {
    let machine = &requested.machine;

    ensure_eq("machine.name", machine.name.as_str(), view.name.as_str())?;
    ensure_eq("machine.node_id", machine.node_id, view.node_id)?;
    ensure_eq("machine.status", DeploymentStatus::Ok, view.status)?;
    ensure_eq("machine.flist", machine.flist.as_str(), view.flist.as_str())?;
    ensure_eq(
        "machine.entrypoint",
        machine.entrypoint.as_str(),
        view.entrypoint.as_str(),
    )?;
    ensure_eq("machine.capacity.cpu", machine.cpu, view.capacity.cpu)?;
    ensure_eq(
        "machine.capacity.memory_mb",
        machine.memory_mb,
        view.capacity.memory_mb,
    )?;
    ensure_eq(
        "machine.rootfs_size",
        Some(machine.rootfs_size_gb),
        bytes_to_gb(view.rootfs_size_bytes),
    )?;

    ensure_eq("machine.mounts.count", machine.disks.len(), view.mounts.len())?;
    for (disk, mount) in machine.disks.iter().zip(&view.mounts) {
        ensure_eq("mount.name", disk.name.as_str(), mount.name.as_str())?;
        ensure_eq(
            &format!("mount.{}.size_bytes", disk.name),
            gb_to_bytes(disk.size_gb),
            mount.size_bytes,
        )?;
        ensure_eq(
            &format!("mount.{}.mount_point", disk.name),
            disk.mountpoint.as_str(),
            mount.mount_point.as_str(),
        )?;
        ensure_eq(
            &format!("mount.{}.state", disk.name),
            DeploymentStatus::Ok,
            mount.state,
        )?;
    }

    let interface = view
        .interfaces
        .first()
        .ok_or_else(|| VerifyError::mismatch("machine.interfaces.count", 1, 0))?;
    ensure_eq(
        "interface.network",
        requested.network.name.as_str(),
        interface.network.as_str(),
    )?;
    if !is_private_member(&requested.network.ip_range, interface.ip) {
        return Err(VerifyError::mismatch(
            "interface.ip",
            format!("private address in {}", requested.network.ip_range),
            interface.ip,
        ));
    }

    if machine.planetary && view.planetary.is_none() {
        return Err(VerifyError::mismatch("machine.planetary", "address", "none"));
    }
    ensure_eq("machine.public_ip", machine.public_ip, view.public_ip.is_some())?;
    ensure_eq(
        "machine.description",
        requested.description.as_str(),
        view.description.as_str(),
    )?;

    Ok(())
}

/// Gateway backend URLs pointing at the workload's planetary address
pub fn backend_urls(view: &DeployedWorkloadView, port: u16) -> VerifyResult<Vec<String>> {
    let raw = view
        .planetary
        .as_deref()
        .ok_or_else(|| VerifyError::mismatch("machine.planetary", "address", "none"))?;
    let addr: Ipv6Addr = raw
        .parse()
        .map_err(|_| VerifyError::mismatch("machine.planetary", "IPv6 address", raw))?;

    Ok(vec![format!("http://[{addr}]:{port}")])
}

pub fn check_gateway(view: &DeployedGatewayView, requested: &GatewayDescriptor) -> VerifyResult<()> {
    ensure_eq("gateway.name", requested.name.as_str(), view.name.as_str())?;
    ensure_eq("gateway.status", DeploymentStatus::Ok, view.status)?;
    if !view.kind.contains("name") {
        return Err(VerifyError::mismatch(
            "gateway.type",
            "name gateway",
            view.kind.as_str(),
        ));
    }
    if !view.domain.contains(&requested.name) {
        return Err(VerifyError::mismatch(
            "gateway.domain",
            format!("domain containing {}", requested.name),
            view.domain.as_str(),
        ));
    }
    ensure_eq(
        "gateway.tls_passthrough",
        requested.tls_passthrough,
        view.tls_passthrough,
    )?;
    // Order-sensitive on purpose
    ensure_eq("gateway.backends", &requested.backends, &view.backends)?;
    Ok(())
}
