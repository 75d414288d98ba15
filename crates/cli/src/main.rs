//! Grid Verifier CLI
//!
//! A command-line tool for running deployment verification scenarios,
//! inspecting nodes and deployments, probing gateway domains and cleaning
//! up after failed runs.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, nodes, probe, run, teardown};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Grid Verifier CLI
#[derive(Parser)]
#[command(name = "gridv")]
#[command(author, version, about = "Grid Verifier: deploy, check and tear down grid workloads", long_about = None)]
pub struct Cli {
    /// Grid bridge URL (can also be set via GRIDV_GRID_URL env var)
    #[arg(long, env = "GRIDV_GRID_URL")]
    pub grid_url: Option<String>,

    /// Project scope for get and teardown (can also be set via GRIDV_PROJECT env var)
    #[arg(long, env = "GRIDV_PROJECT")]
    pub project: Option<String>,

    /// Grid request timeout in seconds
    #[arg(long, default_value_t = 300)]
    pub request_timeout: u64,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the PeerTube deployment scenario end to end
    Run {
        /// Farm to deploy the workload on
        #[arg(long)]
        farm_id: Option<u32>,

        /// Farm to pick the gateway node from (defaults to --farm-id)
        #[arg(long)]
        gateway_farm_id: Option<u32>,

        /// SSH public key injected into the VM
        #[arg(long, env = "GRIDV_SSH_KEY")]
        ssh_key: Option<String>,

        /// Maximum reachability probes
        #[arg(long, default_value_t = 180)]
        attempts: u32,

        /// Seconds between reachability probes
        #[arg(long, default_value_t = 5)]
        interval: u64,

        /// Seed for reproducible deployment names
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List nodes that can host a workload or a gateway
    Nodes {
        /// Farm to search
        #[arg(long)]
        farm_id: Option<u32>,

        /// Virtual CPUs
        #[arg(long, default_value_t = 1)]
        cpu: u32,

        /// Memory in MB
        #[arg(long, default_value_t = 2048)]
        memory_mb: u64,

        /// Root filesystem size in GB
        #[arg(long, default_value_t = 2)]
        rootfs_gb: u64,

        /// Extra disk size in GB
        #[arg(long, default_value_t = 15)]
        disk_gb: u64,

        /// List gateway nodes with a public domain instead
        #[arg(long)]
        gateway: bool,
    },

    /// Show deployed resources
    #[command(subcommand)]
    Get(GetCommands),

    /// Poll a URL until it serves a page containing a marker
    Probe {
        /// URL to poll
        url: String,

        /// Text the response body must contain
        #[arg(long)]
        expect: String,

        /// Maximum attempts
        #[arg(long, default_value_t = 180)]
        attempts: u32,

        /// Seconds between attempts
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },

    /// Delete workloads and gateways
    Teardown {
        /// Workload name to delete (repeatable)
        #[arg(long = "workload")]
        workloads: Vec<String>,

        /// Gateway name to delete (repeatable)
        #[arg(long = "gateway")]
        gateways: Vec<String>,

        /// Delete everything in the project scope
        #[arg(long, conflicts_with_all = ["workloads", "gateways"])]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Show a deployed workload
    Workload {
        /// Deployment name
        name: String,
    },

    /// Show a deployed name gateway
    Gateway {
        /// Gateway name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let file_config = config::Config::load()?;
    let connection = client::Connection {
        grid_url: file_config.grid_url(cli.grid_url.as_deref()),
        project: file_config.project(cli.project.as_deref()),
        request_timeout: Duration::from_secs(cli.request_timeout),
    };

    match cli.command {
        Commands::Run {
            farm_id,
            gateway_farm_id,
            ssh_key,
            attempts,
            interval,
            seed,
        } => {
            let farm_id = file_config.farm_id(farm_id);
            let options = run::RunOptions {
                farm_id,
                gateway_farm_id: gateway_farm_id.unwrap_or(farm_id),
                ssh_key: file_config.ssh_key(ssh_key.as_deref()),
                attempts,
                interval: Duration::from_secs(interval),
                seed,
            };
            run::run_scenario(&connection, options, cli.format).await?;
        }
        Commands::Nodes {
            farm_id,
            cpu,
            memory_mb,
            rootfs_gb,
            disk_gb,
            gateway,
        } => {
            let query = nodes::NodeQuery {
                farm_id: file_config.farm_id(farm_id),
                cpu,
                memory_mb,
                rootfs_gb,
                disk_gb,
                gateway,
            };
            nodes::list_nodes(&connection, query, cli.format).await?;
        }
        Commands::Get(get_cmd) => match get_cmd {
            GetCommands::Workload { name } => {
                inspect::show_workload(&connection, &name, cli.format).await?;
            }
            GetCommands::Gateway { name } => {
                inspect::show_gateway(&connection, &name, cli.format).await?;
            }
        },
        Commands::Probe {
            url,
            expect,
            attempts,
            interval,
        } => {
            probe::probe_url(&url, &expect, attempts, Duration::from_secs(interval), cli.format)
                .await?;
        }
        Commands::Teardown {
            workloads,
            gateways,
            all,
        } => {
            let target = if all {
                teardown::Target::Project
            } else {
                teardown::Target::Names {
                    workloads,
                    gateways,
                }
            };
            teardown::run_teardown(&connection, target, cli.format).await?;
        }
    }

    Ok(())
}
