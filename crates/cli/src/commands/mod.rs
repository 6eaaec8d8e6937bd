//! Subcommand implementations

pub mod cluster;
pub mod environment;
pub mod registry;
