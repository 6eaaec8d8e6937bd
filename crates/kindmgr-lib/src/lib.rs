//! Kind cluster management library
//!
//! This crate provides the core functionality for:
//! - Host OS and container runtime detection (Docker/Podman and their backends)
//! - Kind cluster configuration generation and validation
//! - Cluster lifecycle operations through the `kind` CLI
//! - Registry credential discovery and containerd mirror provisioning
//! - A transport-neutral tool registry exposing all of the above

pub mod error;
pub mod exec;
pub mod kind;
pub mod observability;
pub mod registry;
pub mod runtime;
pub mod tools;

pub use error::{Error, Result};
pub use exec::{CommandOutput, CommandRunner, ExecCommandRunner};
pub use runtime::{Backend, Detector, HostEnv, OsInfo, RuntimeInfo, RuntimeKind};
pub use tools::{ToolRegistry, ToolResult};
