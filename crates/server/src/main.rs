//! mcp-kind-manager - kind cluster management over MCP
//!
//! Serves the kind management tools to an MCP client over stdio. stdout
//! carries protocol traffic only; logs go to stderr.

use anyhow::{Context, Result};
use kindmgr_lib::observability::{self, StructuredLogger};
use kindmgr_lib::{CommandRunner, ExecCommandRunner, OsInfo, ToolRegistry};
use rmcp::{transport::stdio, ServiceExt};
use std::sync::Arc;
use tracing::info;

mod config;
mod server;

use server::{KindManagerServer, SERVER_NAME, SERVER_VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::ServerConfig::load()?;
    observability::init_logging(&config.log_level).context("initializing logging")?;

    let os = OsInfo::detect();
    let logger = StructuredLogger::new(SERVER_NAME);
    logger.log_startup(SERVER_VERSION, &os.os, &os.arch);
    info!(
        timeout_secs = config.command_timeout_secs,
        "Server configured"
    );

    let runner: Arc<dyn CommandRunner> = Arc::new(ExecCommandRunner::new());
    let server = KindManagerServer::new(ToolRegistry::new(runner), config.call_timeout());

    info!("Serving over stdio");
    let service = server
        .serve(stdio())
        .await
        .context("starting MCP service")?;

    tokio::select! {
        result = service.waiting() => {
            let reason = result.context("MCP service task failed")?;
            info!(reason = ?reason, "Service stopped");
            logger.log_shutdown("stdin closed");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            logger.log_shutdown("SIGINT received");
        }
    }

    Ok(())
}
