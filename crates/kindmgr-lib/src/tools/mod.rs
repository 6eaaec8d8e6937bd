//! Transport-neutral tool surface
//!
//! Every tool takes a typed argument struct and produces a text result.
//! Argument structs derive [`schemars::JsonSchema`], so a transport can
//! publish their input schemas and reject payloads of the wrong shape.
//! Operation failures become error-flagged results carrying the failure
//! text.

mod cluster;
mod environment;
mod registry;

pub use cluster::{ClusterNameArgs, CreateClusterArgs, GenerateClusterConfigArgs, KubeconfigArgs};
pub use registry::{ConfigureMirrorsArgs, Overrides};

use crate::exec::CommandRunner;
use crate::kind::Manager;
use crate::runtime::{Detector, HostEnv, RuntimeInfo};
use serde::Serialize;
use std::sync::Arc;

/// Text produced by a tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Pretty-printed JSON result
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::text(text),
            Err(e) => Self::error(format!("failed to serialize result: {}", e)),
        }
    }
}

/// Runs tools against the host's container runtime and `kind`
#[derive(Clone)]
pub struct ToolRegistry {
    runner: Arc<dyn CommandRunner>,
    host: HostEnv,
}

impl ToolRegistry {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_host(runner, HostEnv::from_process())
    }

    pub fn with_host(runner: Arc<dyn CommandRunner>, host: HostEnv) -> Self {
        Self { runner, host }
    }

    /// Fresh detection; results are never reused across calls
    async fn runtime_info(&self) -> RuntimeInfo {
        Detector::with_host(self.runner.clone(), self.host.clone())
            .detect()
            .await
    }

    async fn manager(&self) -> Manager {
        Manager::new(self.runner.clone(), self.runtime_info().await)
    }
}

fn missing(param: &str) -> ToolResult {
    ToolResult::error(format!("parameter '{}' is required", param))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::exec::testing::FakeRunner;
    use crate::runtime::OsInfo;
    use serde::de::DeserializeOwned;
    use serde_json::Value;
    use tempfile::TempDir;

    pub const NATIVE_DOCKER_INFO: &str =
        r#"{"ServerVersion":"26.1.4","OperatingSystem":"Ubuntu 24.04.1 LTS","Name":"buildhost"}"#;

    /// Linux host with an empty temporary home and no WSL signature
    pub fn linux_host() -> (TempDir, HostEnv) {
        let dir = tempfile::tempdir().unwrap();
        let mut host = HostEnv::for_os(OsInfo::for_platform("linux", "x86_64"));
        host.home = Some(dir.path().join("home"));
        host.kernel_version_path = dir.path().join("version");
        (dir, host)
    }

    /// Runner with a native Docker engine installed
    pub fn docker_runner() -> FakeRunner {
        FakeRunner::new()
            .with_programs(&["docker", "kind"])
            .respond("docker", &["info"], NATIVE_DOCKER_INFO)
    }

    pub fn registry(runner: FakeRunner, host: HostEnv) -> (Arc<FakeRunner>, ToolRegistry) {
        let runner = Arc::new(runner);
        (runner.clone(), ToolRegistry::with_host(runner, host))
    }

    /// Decode tool arguments the way a transport would
    pub fn args<T: DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    /// Input schema of an argument type as JSON
    pub fn schema<T: schemars::JsonSchema>() -> Value {
        serde_json::to_value(schemars::schema_for!(T)).unwrap()
    }
}
