//! HTTP adapter for the grid bridge REST API
//!
//! Every request is scoped to a project via [`PROJECT_HEADER`], which keeps
//! `list_*` results limited to the resources of one verification run.

use super::{async_trait, GridClient, GridResult};
use crate::error::GridError;
use crate::models::{
    ContractDelta, DeployedGatewayView, DeployedWorkloadView, GatewayDescriptor, NodeCandidate,
    NodeFilter, NodeId, TwinId, WorkloadDescriptor,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header carrying the project scope of a request
pub const PROJECT_HEADER: &str = "X-Grid-Project";

/// Configuration for [`HttpGridClient`]
#[derive(Debug, Clone)]
pub struct GridClientConfig {
    /// Bridge base URL (e.g., "http://localhost:4000/api/v1")
    pub base_url: String,
    /// Project scope, e.g. "peertube/ptXyz"
    pub project: Option<String>,
    /// Request timeout; deploys block until contracts are on chain
    pub request_timeout: Duration,
}

impl Default for GridClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            project: None,
            request_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TwinResponse {
    twin_id: TwinId,
}

#[derive(Debug, Deserialize)]
struct NodeStatusResponse {
    online: bool,
}

/// [`GridClient`] talking JSON to a grid bridge service
pub struct HttpGridClient {
    client: Client,
    base_url: Url,
    project: Option<String>,
}

impl HttpGridClient {
    pub fn new(config: GridClientConfig) -> GridResult<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(GridError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        Ok(Self {
            client,
            base_url,
            project: config.project,
        })
    }

    pub fn builder() -> HttpGridClientBuilder {
        HttpGridClientBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    fn endpoint(&self, segments: &[&str]) -> GridResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GridError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn scoped(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.project {
            Some(project) => request.header(PROJECT_HEADER, project),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> GridResult<Response> {
        Ok(self.scoped(request).send().await?)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> GridResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GridError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> GridResult<T> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.client.get(url)).await?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> GridResult<T> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.client.post(url).json(body)).await?;
        Self::decode(response).await
    }

    /// GET where 404 means "no such deployment"
    async fn get_views<T: DeserializeOwned>(&self, segments: &[&str]) -> GridResult<Vec<T>> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        Self::decode(response).await
    }

    /// DELETE where 404 means the resource is already gone
    async fn delete(&self, segments: &[&str]) -> GridResult<ContractDelta> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.client.delete(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(path = ?segments, "Delete target already absent");
            return Ok(ContractDelta::empty_deletion());
        }
        Self::decode(response).await
    }
}

#[async_trait]
impl GridClient for HttpGridClient {
    async fn twin_id(&self) -> GridResult<TwinId> {
        let twin: TwinResponse = self.get_json(&["twins", "me"]).await?;
        Ok(twin.twin_id)
    }

    async fn filter_nodes(&self, filter: &NodeFilter) -> GridResult<Vec<NodeCandidate>> {
        self.post_json(&["nodes", "filter"], filter).await
    }

    async fn is_node_online(&self, node_id: NodeId) -> GridResult<bool> {
        let id = node_id.to_string();
        let status: NodeStatusResponse = self.get_json(&["nodes", &id, "status"]).await?;
        Ok(status.online)
    }

    async fn deploy_workload(&self, workload: &WorkloadDescriptor) -> GridResult<ContractDelta> {
        self.post_json(&["machines"], workload).await
    }

    async fn deploy_gateway(&self, gateway: &GatewayDescriptor) -> GridResult<ContractDelta> {
        self.post_json(&["gateways", "name"], gateway).await
    }

    async fn list_workloads(&self) -> GridResult<Vec<String>> {
        self.get_json(&["machines"]).await
    }

    async fn list_gateways(&self) -> GridResult<Vec<String>> {
        self.get_json(&["gateways", "name"]).await
    }

    async fn get_workload(&self, name: &str) -> GridResult<Vec<DeployedWorkloadView>> {
        self.get_views(&["machines", name]).await
    }

    async fn get_gateway(&self, name: &str) -> GridResult<Vec<DeployedGatewayView>> {
        self.get_views(&["gateways", "name", name]).await
    }

    async fn delete_workload(&self, name: &str) -> GridResult<ContractDelta> {
        self.delete(&["machines", name]).await
    }

    async fn delete_gateway(&self, name: &str) -> GridResult<ContractDelta> {
        self.delete(&["gateways", "name", name]).await
    }
}

/// Builder for [`HttpGridClient`]
pub struct HttpGridClientBuilder {
    config: GridClientConfig,
}

impl HttpGridClientBuilder {
    pub fn new() -> Self {
        Self {
            config: GridClientConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.config.project = Some(project.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> GridResult<HttpGridClient> {
        HttpGridClient::new(self.config)
    }
}

impl Default for HttpGridClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
