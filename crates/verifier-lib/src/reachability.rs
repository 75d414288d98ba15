//! Reachability polling for gateway domains
//!
//! Gateway DNS and TLS provisioning is eventually consistent, so a freshly
//! created domain is polled until it serves the expected page. Individual
//! probe failures are "not ready yet", never terminal.

use crate::error::{VerifyError, VerifyResult};
use crate::retry::{async_trait, retry_bounded, RetryPolicy, Sleeper, TokioSleeper};
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Accept header a browser sends for a top-level navigation
pub const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// Status and body of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

/// Why a single probe did not count as reachable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response body does not contain the expected marker")]
    MissingFragment,
}

/// Issues a single HTTP GET
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get(&self, url: &str, accept: &str) -> Result<ProbeResponse, ProbeError>;
}

/// [`HttpProbe`] over reqwest
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str, accept: &str) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        Ok(ProbeResponse { status, body })
    }
}

/// Poller settings
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
    pub accept: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 180,
            interval: Duration::from_secs(5),
            accept: BROWSER_ACCEPT.to_string(),
        }
    }
}

impl PollConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.interval)
    }
}

/// Polls a URL until it answers 200 with a known marker in the body
#[derive(Clone)]
pub struct ReachabilityPoller {
    probe: Arc<dyn HttpProbe>,
    sleeper: Arc<dyn Sleeper>,
    config: PollConfig,
}

impl ReachabilityPoller {
    pub fn new(probe: Arc<dyn HttpProbe>, sleeper: Arc<dyn Sleeper>, config: PollConfig) -> Self {
        Self {
            probe,
            sleeper,
            config,
        }
    }

    /// Poller using reqwest and the tokio timer
    pub fn http(config: PollConfig, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            Arc::new(ReqwestProbe::new(request_timeout)?),
            Arc::new(TokioSleeper),
            config,
        ))
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Probe once and classify the response
    pub async fn probe_once(&self, url: &str, expected_fragment: &str) -> Result<(), ProbeError> {
        let response = self.probe.get(url, &self.config.accept).await?;
        if response.status != 200 {
            return Err(ProbeError::Status(response.status));
        }
        if !response.body.contains(expected_fragment) {
            return Err(ProbeError::MissingFragment);
        }
        Ok(())
    }

    /// Returns the number of attempts it took to see the marker, or
    /// [`VerifyError::ReachabilityTimeout`] once the attempt cap is reached.
    pub async fn poll_until_reachable(&self, url: &str, expected_fragment: &str) -> VerifyResult<u32> {
        let policy = self.config.retry_policy();
        info!(
            url = %url,
            max_attempts = policy.max_attempts,
            interval_secs = policy.interval.as_secs(),
            "Waiting for endpoint to become reachable"
        );

        let result = retry_bounded(&policy, self.sleeper.as_ref(), |attempt| async move {
            match self.probe_once(url, expected_fragment).await {
                Ok(()) => {
                    info!(url = %url, attempt = attempt, "Endpoint is reachable");
                    Ok(())
                }
                Err(e) => {
                    info!(url = %url, attempt = attempt, reason = %e, "Endpoint not reachable yet");
                    Err(e)
                }
            }
        })
        .await;

        match result {
            Ok(done) => Ok(done.attempts),
            Err(exhausted) => {
                warn!(
                    url = %url,
                    attempts = exhausted.attempts,
                    last_error = ?exhausted.last_error,
                    "Endpoint unreachable after all attempts"
                );
                Err(VerifyError::ReachabilityTimeout {
                    url: url.to_string(),
                    attempts: exhausted.attempts,
                })
            }
        }
    }
}
