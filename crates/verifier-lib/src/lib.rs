//! Deployment verification for a decentralized compute grid
//!
//! This crate provides the core functionality for:
//! - Node selection against capacity queries
//! - Deploying a workload and a name gateway, then checking the grid's read-back
//! - Bounded reachability polling of the public domain
//! - Teardown of everything a run created
//! - Run health and observability

pub mod error;
pub mod grid;
pub mod health;
pub mod models;
pub mod naming;
pub mod network;
pub mod observability;
pub mod reachability;
pub mod retry;
pub mod scenario;
pub mod selector;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use error::{GridError, VerifyError, VerifyResult};
pub use grid::{GridClient, GridClientConfig, HttpGridClient};
pub use health::{ComponentStatus, HealthResponse, ReadinessResponse, RunHealthRegistry};
pub use models::*;
pub use naming::{NameGenerator, RandomNames};
pub use observability::{StructuredLogger, VerifierMetrics};
pub use reachability::{PollConfig, ReachabilityPoller};
pub use scenario::{RunPlan, ScenarioConfig};
pub use selector::NodeSelector;
pub use verifier::{DeploymentVerifier, RunOutcome, Step, TeardownReport, VerificationReport};
