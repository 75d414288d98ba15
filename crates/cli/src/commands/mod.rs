//! Subcommand implementations

pub mod inspect;
pub mod nodes;
pub mod probe;
pub mod run;
pub mod teardown;
