//! Error types for the deployment verifier

/// Result type alias using [`VerifyError`].
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Transport-level failures talking to the grid bridge.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with a non-success status.
    #[error("grid API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A request URL could not be built.
    #[error("invalid grid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Response payload did not match the expected shape.
    #[error("failed to decode grid response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors raised while verifying a deployment.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// No gateway-capable node exposing a public domain was found.
    #[error("no gateway nodes available in farm {farm_id}")]
    NoGatewayAvailable { farm_id: u32 },

    /// No online node satisfies the resource request.
    #[error("no nodes available in farm {farm_id} for the requested resources")]
    NoNodeAvailable { farm_id: u32 },

    /// A deploy or delete returned a contract delta of the wrong shape.
    #[error("unexpected contract shape from {operation}: {detail}")]
    UnexpectedContractShape {
        operation: &'static str,
        detail: String,
    },

    /// Observed state disagrees with what was requested.
    #[error("state mismatch on {field}: expected {expected}, observed {observed}")]
    StateMismatch {
        field: String,
        expected: String,
        observed: String,
    },

    /// The public endpoint never became reachable.
    #[error("{url} unreachable after {attempts} attempts")]
    ReachabilityTimeout { url: String, attempts: u32 },

    /// A descriptor failed client-side validation before submission.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The caller stopped the run before verification finished.
    #[error("run cancelled")]
    Cancelled,

    /// The grid bridge could not be reached or answered badly.
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl VerifyError {
    pub fn mismatch(
        field: impl Into<String>,
        expected: impl std::fmt::Debug,
        observed: impl std::fmt::Debug,
    ) -> Self {
        Self::StateMismatch {
            field: field.into(),
            expected: format!("{expected:?}"),
            observed: format!("{observed:?}"),
        }
    }

    pub fn contract_shape(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::UnexpectedContractShape {
            operation,
            detail: detail.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidDescriptor(msg.into())
    }

    /// Capacity exhaustion on the grid rather than a defect.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            VerifyError::NoGatewayAvailable { .. } | VerifyError::NoNodeAvailable { .. }
        )
    }

    /// Errors that indicate a logic or infrastructure bug.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VerifyError::UnexpectedContractShape { .. } | VerifyError::StateMismatch { .. }
        )
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::NoGatewayAvailable { .. } => "no_gateway_available",
            VerifyError::NoNodeAvailable { .. } => "no_node_available",
            VerifyError::UnexpectedContractShape { .. } => "unexpected_contract_shape",
            VerifyError::StateMismatch { .. } => "state_mismatch",
            VerifyError::ReachabilityTimeout { .. } => "reachability_timeout",
            VerifyError::InvalidDescriptor(_) => "invalid_descriptor",
            VerifyError::Cancelled => "cancelled",
            VerifyError::Grid(_) => "grid",
        }
    }
}
