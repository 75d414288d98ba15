//! Deployment inspection commands

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::Tabled;
use verifier_lib::{DeployedGatewayView, DeployedWorkloadView};

use crate::client::Connection;
use crate::output::{
    color_status, format_bytes, print_json, print_table, print_warning, yes_no, OutputFormat,
};

/// Row for mounts table
#[derive(Tabled)]
struct MountRow {
    #[tabled(rename = "Disk")]
    name: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Mount Point")]
    mount_point: String,
    #[tabled(rename = "State")]
    state: String,
}

/// Show a workload by deployment name
pub async fn show_workload(connection: &Connection, name: &str, format: OutputFormat) -> Result<()> {
    let grid = connection.client()?;
    let views = grid
        .get_workload(name)
        .await
        .with_context(|| format!("Failed to read workload {name}"))?;

    match format {
        OutputFormat::Json => print_json(&views)?,
        OutputFormat::Table => {
            if views.is_empty() {
                print_warning(&format!("No workload named {name} in this project"));
                return Ok(());
            }
            for view in &views {
                print_workload(name, view);
            }
        }
    }

    Ok(())
}

fn print_workload(deployment: &str, view: &DeployedWorkloadView) {
    println!("{}", "Workload".bold());
    println!("{}", "=".repeat(50));
    println!("Deployment:   {}", deployment.cyan());
    println!("Machine:      {}", view.name.cyan());
    println!("Node:         {}", view.node_id);
    println!("Status:       {}", color_status(view.status));
    println!("Flist:        {}", view.flist);
    println!("Entrypoint:   {}", view.entrypoint);
    println!("CPU:          {}", view.capacity.cpu);
    println!("Memory:       {}", format_bytes(view.capacity.memory_mb * 1024 * 1024));
    println!("Root FS:      {}", format_bytes(view.rootfs_size_bytes));
    if !view.description.is_empty() {
        println!("Description:  {}", view.description);
    }
    println!();

    println!("{}", "Network".bold());
    println!("{}", "-".repeat(50));
    for interface in &view.interfaces {
        println!("{:<13} {}", format!("{}:", interface.network), interface.ip);
    }
    println!("Planetary:    {}", view.planetary.as_deref().unwrap_or("-"));
    println!("Mycelium:     {}", view.mycelium.as_deref().unwrap_or("-"));
    println!("Public IP:    {}", view.public_ip.as_deref().unwrap_or("-"));
    println!();

    let rows: Vec<MountRow> = view
        .mounts
        .iter()
        .map(|m| MountRow {
            name: m.name.clone(),
            size: format_bytes(m.size_bytes),
            mount_point: m.mount_point.clone(),
            state: color_status(m.state),
        })
        .collect();
    print_table(&rows);
}

/// Show a name gateway
pub async fn show_gateway(connection: &Connection, name: &str, format: OutputFormat) -> Result<()> {
    let grid = connection.client()?;
    let views = grid
        .get_gateway(name)
        .await
        .with_context(|| format!("Failed to read gateway {name}"))?;

    match format {
        OutputFormat::Json => print_json(&views)?,
        OutputFormat::Table => {
            if views.is_empty() {
                print_warning(&format!("No gateway named {name} in this project"));
                return Ok(());
            }
            for view in &views {
                print_gateway(view);
            }
        }
    }

    Ok(())
}

fn print_gateway(view: &DeployedGatewayView) {
    println!("{}", "Gateway".bold());
    println!("{}", "=".repeat(50));
    println!("Name:            {}", view.name.cyan());
    println!("Node:            {}", view.node_id);
    println!("Status:          {}", color_status(view.status));
    println!("Type:            {}", view.kind);
    println!("Domain:          {}", view.domain);
    println!("TLS passthrough: {}", yes_no(view.tls_passthrough));
    println!("Backends:");
    for backend in &view.backends {
        println!("  - {}", backend);
    }
}
