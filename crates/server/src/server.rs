//! MCP tool server
//!
//! Each tool call runs on its own task. A call that panics, exceeds the
//! configured budget, or is cancelled by the client ends as an error result;
//! abandoning a call aborts its task, which kills any child process.

use kindmgr_lib::observability::StructuredLogger;
use kindmgr_lib::tools::{
    ClusterNameArgs, ConfigureMirrorsArgs, CreateClusterArgs, GenerateClusterConfigArgs,
    KubeconfigArgs,
};
use kindmgr_lib::{ToolRegistry, ToolResult};
use rmcp::handler::server::{router::tool::ToolRouter, wrapper::Parameters};
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub const SERVER_NAME: &str = "mcp-kind-manager";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const INSTRUCTIONS: &str = "Manages local kind clusters. Start with detect_environment, \
    review the YAML from generate_cluster_config, then pass it to create_cluster.";

pub struct KindManagerServer {
    tools: ToolRegistry,
    call_timeout: Option<Duration>,
    logger: StructuredLogger,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl KindManagerServer {
    pub fn new(tools: ToolRegistry, call_timeout: Option<Duration>) -> Self {
        Self {
            tools,
            call_timeout,
            logger: StructuredLogger::new(SERVER_NAME),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Detect the host OS, container runtime (Docker/Podman), its backend \
        (native, Docker Desktop, Colima, Rancher Desktop, OrbStack, Podman machine) and \
        network advice for port mappings.")]
    async fn detect_environment(
        &self,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("detect_environment", ctx.ct, |tools| async move {
            tools.detect_environment().await
        })
        .await
    }

    #[tool(description = "Generate a kind cluster configuration YAML for review. Does not \
        create anything; pass the YAML to create_cluster afterwards.")]
    async fn generate_cluster_config(
        &self,
        Parameters(args): Parameters<GenerateClusterConfigArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("generate_cluster_config", ctx.ct, |tools| async move {
            tools.generate_cluster_config(args).await
        })
        .await
    }

    #[tool(description = "Create a kind cluster from a configuration YAML. Takes a few \
        minutes while node images are pulled and the control plane starts.")]
    async fn create_cluster(
        &self,
        Parameters(args): Parameters<CreateClusterArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("create_cluster", ctx.ct, |tools| async move {
            tools.create_cluster(args).await
        })
        .await
    }

    #[tool(description = "Delete a kind cluster and all of its node containers.")]
    async fn delete_cluster(
        &self,
        Parameters(args): Parameters<ClusterNameArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("delete_cluster", ctx.ct, |tools| async move {
            tools.delete_cluster(args).await
        })
        .await
    }

    #[tool(description = "List existing kind clusters.")]
    async fn list_clusters(
        &self,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("list_clusters", ctx.ct, |tools| async move {
            tools.list_clusters().await
        })
        .await
    }

    #[tool(description = "Show the nodes of a kind cluster with their roles and container states.")]
    async fn get_cluster_status(
        &self,
        Parameters(args): Parameters<ClusterNameArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("get_cluster_status", ctx.ct, |tools| async move {
            tools.get_cluster_status(args).await
        })
        .await
    }

    #[tool(description = "Return the kubeconfig of a kind cluster.")]
    async fn get_kubeconfig(
        &self,
        Parameters(args): Parameters<KubeconfigArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("get_kubeconfig", ctx.ct, |tools| async move {
            tools.get_kubeconfig(args).await
        })
        .await
    }

    #[tool(description = "Discover registry credential files on the host for the detected \
        runtime. Returns the file path, registries with stored credentials, and whether the \
        credentials are inline or managed by a credential helper.")]
    async fn detect_credentials(
        &self,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("detect_credentials", ctx.ct, |tools| async move {
            tools.detect_credentials().await
        })
        .await
    }

    #[tool(description = "Configure containerd registry mirrors on a running kind cluster. \
        Writes a hosts.toml per registry into every node, then restarts containerd on all nodes.")]
    async fn configure_registry_mirrors(
        &self,
        Parameters(args): Parameters<ConfigureMirrorsArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("configure_registry_mirrors", ctx.ct, |tools| async move {
            tools.configure_registry_mirrors(args).await
        })
        .await
    }
}

impl KindManagerServer {
    /// Run one tool call on its own task, bounded by the call budget and `ct`
    async fn run_tool<F, Fut>(
        &self,
        tool: &str,
        ct: CancellationToken,
        call: F,
    ) -> Result<CallToolResult, McpError>
    where
        F: FnOnce(ToolRegistry) -> Fut,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let started = Instant::now();
        let mut handle = tokio::spawn(call(self.tools.clone()));

        let timeout = self.call_timeout;
        let deadline = async move {
            match timeout {
                Some(after) => {
                    tokio::time::sleep(after).await;
                    after
                }
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let (result, abandoned) = tokio::select! {
            biased;
            joined = &mut handle => match joined {
                Ok(result) => (result, None),
                Err(e) if e.is_panic() => {
                    error!(tool = %tool, "Tool call panicked");
                    (ToolResult::error(format!("{} failed: internal error", tool)), None)
                }
                Err(e) => {
                    warn!(tool = %tool, error = %e, "Tool task ended early");
                    (ToolResult::error(format!("{} was aborted", tool)), None)
                }
            },
            after = &mut deadline => (
                ToolResult::error(format!("{} timed out after {}s", tool, after.as_secs())),
                Some("timeout"),
            ),
            _ = ct.cancelled() => (
                ToolResult::error(format!("{} was cancelled", tool)),
                Some("cancelled"),
            ),
        };

        let elapsed = started.elapsed();
        match abandoned {
            Some(reason) => {
                handle.abort();
                // Wait for the task to be dropped so its child process is gone
                let _ = handle.await;
                self.logger.log_tool_abandoned(tool, elapsed, reason);
            }
            None => self.logger.log_tool_call(tool, elapsed, result.is_error),
        }

        Ok(into_call_result(result))
    }
}

fn into_call_result(result: ToolResult) -> CallToolResult {
    let content = vec![Content::text(result.text)];
    if result.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

#[tool_handler]
impl ServerHandler for KindManagerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }
}
