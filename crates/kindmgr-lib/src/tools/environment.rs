use super::{ToolRegistry, ToolResult};
use crate::kind::{advise, NetworkAdvice};
use crate::runtime::{Backend, OsInfo, RuntimeKind};
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct EnvironmentReport<'a> {
    os: &'a OsInfo,
    runtime: RuntimeKind,
    backend: Backend,
    version: &'a str,
    socket_path: &'a str,
    available: bool,
    network_advice: NetworkAdvice,
    #[serde(skip_serializing_if = "str::is_empty")]
    error: &'a str,
}

impl ToolRegistry {
    /// Host OS, runtime, backend and network advice as JSON
    pub async fn detect_environment(&self) -> ToolResult {
        debug!(tool = "detect_environment", "Tool called");
        let info = self.runtime_info().await;

        ToolResult::json(&EnvironmentReport {
            os: &info.os,
            runtime: info.runtime,
            backend: info.backend,
            version: &info.version,
            socket_path: &info.socket_path,
            available: info.available,
            network_advice: advise(&info),
            error: &info.error,
        })
    }
}
