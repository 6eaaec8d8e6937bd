//! Cluster lifecycle through the `kind` CLI
//!
//! Creation, deletion and listing are delegated to `kind`. Node state and
//! in-node command execution go through the container runtime CLI, since
//! kind nodes are plain containers.

use super::config::{validate_config, NodeRole};
use crate::error::{Error, Result};
use crate::exec::{display_command, CommandRunner};
use crate::runtime::{RuntimeInfo, RuntimeKind};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

const KIND_BINARY: &str = "kind";
/// Line printed by `kind get clusters` when there is nothing to list
const NO_CLUSTERS_SENTINEL: &str = "No kind clusters found.";
/// Prefix of the line `kind get nodes` prints for an unknown cluster
const NO_NODES_PREFIX: &str = "No kind nodes found";
const STATE_FORMAT: &str = "{{.State.Status}}";
const UNKNOWN_STATE: &str = "unknown";

impl NodeRole {
    /// Classify a node from its container name.
    ///
    /// kind names nodes `<cluster>-control-plane[N]` and `<cluster>-worker[N]`;
    /// the role is not queried from the node itself.
    pub fn from_node_name(name: &str) -> Self {
        if name.contains("control-plane") {
            NodeRole::ControlPlane
        } else {
            NodeRole::Worker
        }
    }
}

/// State of one node container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub name: String,
    pub role: NodeRole,
    pub status: String,
}

/// State of a cluster and its nodes, in `kind get nodes` order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub name: String,
    pub nodes: Vec<NodeStatus>,
}

/// Drives `kind` and the detected container runtime
pub struct Manager {
    runner: Arc<dyn CommandRunner>,
    runtime: RuntimeInfo,
}

impl Manager {
    pub fn new(runner: Arc<dyn CommandRunner>, runtime: RuntimeInfo) -> Self {
        Self { runner, runtime }
    }

    pub fn runtime(&self) -> &RuntimeInfo {
        &self.runtime
    }

    /// Build `kind` arguments, selecting the Podman provider when needed
    fn kind_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if self.runtime.runtime == RuntimeKind::Podman {
            full.push("--runtime".to_string());
            full.push("podman".to_string());
        }
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    async fn run_kind(&self, args: Vec<String>) -> Result<String> {
        let command = display_command(KIND_BINARY, &args);
        self.runner
            .run(KIND_BINARY, &args)
            .await?
            .into_result(command)
    }

    /// Create a cluster from a kind configuration document
    pub async fn create_cluster(&self, name: &str, config_yaml: &str) -> Result<String> {
        require_name(name)?;
        validate_config(config_yaml)
            .map_err(|e| Error::invalid_config(e.to_string()))?;

        // Removed when dropped, on every return path
        let mut config_file = tempfile::Builder::new()
            .prefix("kind-config-")
            .suffix(".yaml")
            .tempfile()?;
        config_file.write_all(config_yaml.as_bytes())?;
        config_file.flush()?;

        let config_path = config_file.path().to_string_lossy().into_owned();
        let args = self.kind_args(&["create", "cluster", "--name", name, "--config", config_path.as_str()]);

        info!(cluster = %name, runtime = %self.runtime.runtime, "Creating kind cluster");
        let output = self.run_kind(args).await?;
        info!(cluster = %name, "Cluster created");
        Ok(output)
    }

    pub async fn delete_cluster(&self, name: &str) -> Result<String> {
        require_name(name)?;
        info!(cluster = %name, "Deleting kind cluster");
        self.run_kind(self.kind_args(&["delete", "cluster", "--name", name]))
            .await
    }

    /// Names of existing clusters; an empty list when there are none
    pub async fn list_clusters(&self) -> Result<Vec<String>> {
        debug!("Listing kind clusters");
        let output = self.run_kind(self.kind_args(&["get", "clusters"])).await?;

        let trimmed = output.trim();
        if trimmed == NO_CLUSTERS_SENTINEL {
            return Ok(Vec::new());
        }
        Ok(non_empty_lines(trimmed))
    }

    /// Kubeconfig for a cluster; `internal` returns the in-network endpoint
    pub async fn get_kubeconfig(&self, name: &str, internal: bool) -> Result<String> {
        require_name(name)?;
        debug!(cluster = %name, internal, "Fetching kubeconfig");

        let mut args = self.kind_args(&["get", "kubeconfig", "--name", name]);
        if internal {
            args.push("--internal".to_string());
        }
        self.run_kind(args).await
    }

    /// Node container names of a cluster, possibly empty
    pub async fn cluster_nodes(&self, name: &str) -> Result<Vec<String>> {
        let output = self
            .run_kind(self.kind_args(&["get", "nodes", "--name", name]))
            .await?;
        // kind exits 0 for unknown clusters and says so on stderr
        Ok(non_empty_lines(&output)
            .into_iter()
            .filter(|line| !line.starts_with(NO_NODES_PREFIX))
            .collect())
    }

    /// Node roles and container states of a cluster.
    ///
    /// A node whose state cannot be inspected is reported as `unknown`
    /// instead of failing the whole call.
    pub async fn get_cluster_status(&self, name: &str) -> Result<ClusterStatus> {
        require_name(name)?;
        debug!(cluster = %name, "Fetching cluster status");

        let node_names = self.cluster_nodes(name).await?;
        if node_names.is_empty() {
            return Err(Error::not_found(format!(
                "cluster {:?} not found or has no nodes",
                name
            )));
        }

        let mut nodes = Vec::with_capacity(node_names.len());
        for node in node_names {
            let status = match self.inspect_state(&node).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(node = %node, error = %e, "Node inspection failed");
                    UNKNOWN_STATE.to_string()
                }
            };
            nodes.push(NodeStatus {
                role: NodeRole::from_node_name(&node),
                name: node,
                status,
            });
        }

        Ok(ClusterStatus {
            name: name.to_string(),
            nodes,
        })
    }

    async fn inspect_state(&self, node: &str) -> Result<String> {
        let binary = self.runtime.runtime.binary();
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            STATE_FORMAT.to_string(),
            node.to_string(),
        ];
        let command = display_command(binary, &args);
        let output = self.runner.run(binary, &args).await?.into_result(command)?;
        Ok(output.trim().to_string())
    }

    /// Run a command inside a node container
    pub async fn exec_on_node(&self, node: &str, command: &[String]) -> Result<String> {
        let binary = self.runtime.runtime.binary();
        debug!(node = %node, command = ?command, "Executing on node");

        let mut args = Vec::with_capacity(command.len() + 2);
        args.push("exec".to_string());
        args.push(node.to_string());
        args.extend(command.iter().cloned());

        self.runner
            .run(binary, &args)
            .await?
            .into_result(format!("exec on node {}", node))
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input("cluster name is required"));
    }
    Ok(())
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
