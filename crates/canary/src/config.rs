//! Canary configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use verifier_lib::{GridClientConfig, PollConfig, ScenarioConfig};

/// Canary configuration, read from `CANARY_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct CanaryConfig {
    /// Grid bridge base URL
    #[serde(default = "default_grid_url")]
    pub grid_url: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between the start of consecutive runs
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_farm_id")]
    pub farm_id: u32,

    /// Farm to pick gateway nodes from; defaults to `farm_id`
    #[serde(default)]
    pub gateway_farm_id: Option<u32>,

    /// Public key injected into the workload
    #[serde(default)]
    pub ssh_key: String,

    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Timeout for a single grid request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for a single reachability probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Consecutive failed runs before /healthz reports unhealthy
    #[serde(default = "default_unhealthy_after")]
    pub unhealthy_after: u32,
}

fn default_grid_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_interval() -> u64 {
    3600
}

fn default_farm_id() -> u32 {
    1
}

fn default_poll_attempts() -> u32 {
    180
}

fn default_poll_interval() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_unhealthy_after() -> u32 {
    verifier_lib::health::DEFAULT_UNHEALTHY_AFTER
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            grid_url: default_grid_url(),
            api_port: default_api_port(),
            interval_secs: default_interval(),
            farm_id: default_farm_id(),
            gateway_farm_id: None,
            ssh_key: String::new(),
            poll_attempts: default_poll_attempts(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            unhealthy_after: default_unhealthy_after(),
        }
    }
}

impl CanaryConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("CANARY").try_parsing(true))
    }

    fn from_source(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to read canary configuration")?;

        config
            .try_deserialize()
            .context("invalid canary configuration")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn scenario(&self) -> ScenarioConfig {
        let mut scenario = ScenarioConfig::peertube(self.ssh_key.clone());
        scenario.farm_id = self.farm_id;
        scenario.gateway_farm_id = self.gateway_farm_id.unwrap_or(self.farm_id);
        scenario
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            max_attempts: self.poll_attempts,
            interval: Duration::from_secs(self.poll_interval_secs),
            ..PollConfig::default()
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Grid client settings scoped to one run's project
    pub fn grid_config(&self, project: String) -> GridClientConfig {
        GridClientConfig {
            base_url: self.grid_url.clone(),
            project: Some(project),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
