//! containerd registry mirror provisioning for kind nodes
//!
//! Mirrors are configured through containerd's `config_path` mechanism: one
//! `hosts.toml` per upstream registry under `/etc/containerd/certs.d`. The
//! files are written into running nodes with `exec`, then containerd is
//! restarted on every node.

use super::credentials::CredentialInfo;
use crate::error::{Error, Result};
use crate::kind::{Manager, Mount, NodeRole};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

pub const CERTS_DIR: &str = "/etc/containerd/certs.d";
const DOCKER_HUB: &str = "docker.io";
const DOCKER_HUB_UPSTREAM: &str = "https://registry-1.docker.io";

/// containerd patch enabling per-registry host configuration
pub const CONFIG_PATH_PATCH: &str =
    "[plugins.\"io.containerd.grpc.v1.cri\".registry]\n  config_path = \"/etc/containerd/certs.d\"";

/// Writes `$1` to the path `$2`. Both arrive as positional arguments, so
/// neither is ever parsed by the shell.
pub const WRITE_FILE_SCRIPT: &str = "printf '%s' \"$1\" > \"$2\"";

/// Replace pulls from `original` with pulls from `mirror`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RegistryOverride {
    /// Upstream registry host, e.g. `docker.io` or `registry.example.com:5000`
    pub original: String,
    /// Mirror endpoint, e.g. `http://localhost:5000`; plain HTTP when no scheme is given
    pub mirror: String,
}

impl RegistryOverride {
    pub fn new(original: impl Into<String>, mirror: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            mirror: mirror.into(),
        }
    }

    /// Parsed mirror endpoint, serialized by `url`.
    ///
    /// A bare root path is dropped so that containerd applies its default
    /// `/v2` prefix.
    pub fn mirror_endpoint(&self) -> Result<String> {
        let raw = self.mirror.as_str();
        if raw.is_empty() {
            return Err(Error::invalid_input(
                "registry override needs both 'original' and 'mirror'",
            ));
        }
        if let Some(c) = raw.chars().find(|c| is_forbidden_in_mirror(*c)) {
            return Err(Error::invalid_input(format!(
                "mirror {:?} contains forbidden character {:?}",
                raw, c
            )));
        }

        let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else if raw.contains("://") {
            return Err(Error::invalid_input(format!(
                "mirror {:?} must use http or https",
                raw
            )));
        } else {
            format!("http://{}", raw)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| Error::invalid_input(format!("invalid mirror URL {:?}: {}", raw, e)))?;
        if url.host_str().is_none() {
            return Err(Error::invalid_input(format!("mirror {:?} has no host", raw)));
        }

        let endpoint = url.as_str();
        if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
            Ok(endpoint.trim_end_matches('/').to_string())
        } else {
            Ok(endpoint.to_string())
        }
    }

    fn validate_original(&self) -> Result<()> {
        if self.original.is_empty() {
            return Err(Error::invalid_input(
                "registry override needs both 'original' and 'mirror'",
            ));
        }
        if !self.original.chars().all(is_registry_host_char) {
            return Err(Error::invalid_input(format!(
                "registry {:?} must be a bare host[:port]",
                self.original
            )));
        }
        Ok(())
    }
}

fn is_registry_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '[' | ']')
}

fn is_forbidden_in_mirror(c: char) -> bool {
    c.is_control() || c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '`')
}

/// Which nodes a post-create command runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeSelector {
    All,
    ControlPlane,
    Worker,
}

impl NodeSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeSelector::All => "all",
            NodeSelector::ControlPlane => "control-plane",
            NodeSelector::Worker => "worker",
        }
    }

    pub fn matches(&self, node: &str) -> bool {
        match self {
            NodeSelector::All => true,
            NodeSelector::ControlPlane => NodeRole::from_node_name(node) == NodeRole::ControlPlane,
            NodeSelector::Worker => NodeRole::from_node_name(node) == NodeRole::Worker,
        }
    }
}

/// A command executed inside matching nodes after cluster creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCommand {
    pub node_selector: NodeSelector,
    pub description: String,
    pub command: Vec<String>,
}

/// Everything needed to point a cluster at registry mirrors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub containerd_patches: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_mounts: Vec<Mount>,
    pub post_create_commands: Vec<NodeCommand>,
}

/// Generate mirror provisioning for `overrides`.
///
/// The credential file is mounted only when its credentials are inline;
/// helper-managed credentials cannot be resolved inside a node.
pub fn generate_mirror_config(
    overrides: &[RegistryOverride],
    credentials: Option<&CredentialInfo>,
) -> Result<MirrorConfig> {
    if overrides.is_empty() {
        return Err(Error::invalid_input("at least one registry override is required"));
    }

    let mut commands = Vec::with_capacity(overrides.len() * 2);
    for o in overrides {
        let hosts_toml = generate_hosts_toml(o)?;
        let endpoint = o.mirror_endpoint()?;
        let dir = format!("{}/{}", CERTS_DIR, o.original);

        commands.push(NodeCommand {
            node_selector: NodeSelector::All,
            description: format!("Create registry config directory for {}", o.original),
            command: vec!["mkdir".into(), "-p".into(), dir.clone()],
        });
        commands.push(NodeCommand {
            node_selector: NodeSelector::All,
            description: format!("Configure mirror for {} -> {}", o.original, endpoint),
            command: vec![
                "sh".into(),
                "-c".into(),
                WRITE_FILE_SCRIPT.into(),
                "sh".into(),
                hosts_toml,
                format!("{}/hosts.toml", dir),
            ],
        });
    }

    let extra_mounts = credentials
        .filter(|c| c.inline_auth)
        .map(|c| Mount {
            host_path: c.file_path.to_string_lossy().into_owned(),
            container_path: c.mount_path.clone(),
            read_only: true,
            propagation: String::new(),
        })
        .into_iter()
        .collect();

    Ok(MirrorConfig {
        containerd_patches: vec![CONFIG_PATH_PATCH.to_string()],
        extra_mounts,
        post_create_commands: commands,
    })
}

/// Render the containerd `hosts.toml` for one override
pub fn generate_hosts_toml(o: &RegistryOverride) -> Result<String> {
    o.validate_original()?;
    let mirror = o.mirror_endpoint()?;

    let server = if o.original == DOCKER_HUB {
        DOCKER_HUB_UPSTREAM.to_string()
    } else {
        format!("https://{}", o.original)
    };

    let mut toml = format!("server = \"{}\"\n\n", server);
    toml.push_str(&format!("[host.\"{}\"]\n", mirror));
    toml.push_str("  capabilities = [\"pull\", \"resolve\"]\n");
    if mirror.starts_with("http://") {
        toml.push_str("  skip_verify = true\n");
    }
    Ok(toml)
}

/// Apply mirror provisioning to a running cluster.
///
/// Commands run one node at a time in program order and never abort early;
/// each outcome is recorded as an `OK` or `FAILED` line. containerd is then
/// restarted on every node. Only failing to find the nodes is an error.
pub async fn apply_mirror_config(
    manager: &Manager,
    cluster: &str,
    config: &MirrorConfig,
) -> Result<Vec<String>> {
    let nodes = manager
        .cluster_nodes(cluster)
        .await
        .map_err(|e| Error::lookup(cluster, e))?;
    if nodes.is_empty() {
        return Err(Error::lookup(
            cluster,
            Error::not_found(format!("cluster {:?} has no nodes", cluster)),
        ));
    }
    info!(cluster = %cluster, nodes = nodes.len(), commands = config.post_create_commands.len(), "Applying registry mirrors");

    let mut results = Vec::new();
    for cmd in &config.post_create_commands {
        for node in nodes.iter().filter(|n| cmd.node_selector.matches(n)) {
            let outcome = manager.exec_on_node(node, &cmd.command).await;
            results.push(result_line(node, &cmd.description, outcome));
        }
    }

    let restart = vec!["systemctl".to_string(), "restart".to_string(), "containerd".to_string()];
    for node in &nodes {
        let outcome = manager.exec_on_node(node, &restart).await;
        results.push(result_line(node, "restart containerd", outcome));
    }

    Ok(results)
}

fn result_line(node: &str, description: &str, outcome: Result<String>) -> String {
    match outcome {
        Ok(output) => {
            let trimmed = output.trim();
            if trimmed.is_empty() {
                format!("OK [{}] {}", node, description)
            } else {
                format!("OK [{}] {}: {}", node, description, trimmed)
            }
        }
        Err(e) => {
            warn!(node = %node, step = %description, error = %e, "Mirror step failed");
            format!("FAILED [{}] {}: {}", node, description, e)
        }
    }
}
