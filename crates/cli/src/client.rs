//! Grid client construction for CLI commands

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use verifier_lib::{GridClient, GridClientConfig, HttpGridClient};

/// Connection settings resolved from flags, env and the config file
#[derive(Debug, Clone)]
pub struct Connection {
    pub grid_url: String,
    pub project: Option<String>,
    pub request_timeout: Duration,
}

impl Connection {
    pub fn client(&self) -> Result<Arc<dyn GridClient>> {
        self.client_for(self.project.clone())
    }

    /// Client scoped to an explicit project
    pub fn client_for(&self, project: Option<String>) -> Result<Arc<dyn GridClient>> {
        let client = HttpGridClient::new(GridClientConfig {
            base_url: self.grid_url.clone(),
            project,
            request_timeout: self.request_timeout,
        })
        .with_context(|| format!("Invalid grid URL: {}", self.grid_url))?;

        Ok(Arc::new(client))
    }
}
