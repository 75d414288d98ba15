//! Grid canary: recurring deployment verification with health and metrics endpoints

pub mod api;
pub mod config;
pub mod runner;

pub use config::CanaryConfig;
pub use runner::Canary;
