//! Kind cluster configuration generation and validation
//!
//! Builds `kind.x-k8s.io/v1alpha4` `Cluster` documents from declarative
//! options and checks the structural rules of documents supplied by callers.

use super::network::{advise, default_port_mappings};
use crate::error::{Error, Result};
use crate::registry::find_credentials;
use crate::runtime::{HostEnv, RuntimeInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Top-level `kind` discriminator of every kind cluster document
pub const CLUSTER_KIND: &str = "Cluster";
/// Top-level `apiVersion` discriminator understood by this crate
pub const CLUSTER_API_VERSION: &str = "kind.x-k8s.io/v1alpha4";
/// Repository of the kind node images
pub const NODE_IMAGE_REPOSITORY: &str = "kindest/node";

/// Upper bound on control-plane and on worker nodes in one generated cluster
pub const MAX_NODES_PER_ROLE: i64 = 100;

/// Only the first control-plane node receives `extraPortMappings`.
///
/// That node acts as the single ingress node of the cluster; mapping the
/// same host ports on several nodes would make creation fail on conflicts.
pub const INGRESS_NODE_INDEX: usize = 0;

/// Node role inside a kind cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    ControlPlane,
    Worker,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::ControlPlane => "control-plane",
            NodeRole::Worker => "worker",
        }
    }

    /// Parse the literal role string used in cluster documents
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "control-plane" => Some(NodeRole::ControlPlane),
            "worker" => Some(NodeRole::Worker),
            _ => None,
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-to-node port mapping (`extraPortMappings`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub listen_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

/// Host-to-node mount (`extraMounts`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    pub host_path: String,
    pub container_path: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub propagation: String,
}

/// Cluster networking block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip_family: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_server_address: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub api_server_port: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pod_subnet: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subnet: String,
    #[serde(rename = "disableDefaultCNI", skip_serializing_if = "is_false")]
    pub disable_default_cni: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kube_proxy_mode: String,
}

/// One node entry of a cluster document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeConfig {
    pub role: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_port_mappings: Vec<PortMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_mounts: Vec<Mount>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kubeadm_config_patches: Vec<String>,
}

/// A kind cluster document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterConfig {
    pub kind: String,
    pub api_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networking: Option<NetworkConfig>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub containerd_config_patches: Vec<String>,
}

impl ClusterConfig {
    /// Count nodes with the given role
    pub fn count_role(&self, role: NodeRole) -> usize {
        self.nodes.iter().filter(|n| n.role == role.as_str()).count()
    }
}

/// Options for [`generate_config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub cluster_name: String,
    pub workers: i64,
    /// Treated as 1 when zero or negative
    pub control_planes: i64,
    pub kubernetes_version: String,
    pub port_mappings: Vec<PortMapping>,
    pub extra_mounts: Vec<Mount>,
    pub containerd_patches: Vec<String>,
    pub pod_subnet: String,
    pub service_subnet: String,
    pub disable_default_cni: bool,
    pub labels: BTreeMap<String, String>,
    pub ip_family: String,
    pub kube_proxy_mode: String,
    pub api_server_port: u16,
    pub feature_gates: BTreeMap<String, bool>,
}

impl ConfigOptions {
    /// Options for a single control-plane cluster named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            cluster_name: name.into(),
            control_planes: 1,
            ..Default::default()
        }
    }

    /// Map HTTP and HTTPS host ports on the address the runtime can expose
    pub fn expose_ingress(&mut self, runtime: &RuntimeInfo) {
        self.port_mappings = default_port_mappings(&advise(runtime).listen_address);
    }

    /// Mount the host's registry credential file read-only into every node.
    ///
    /// Leaves the options unchanged when no credential file is found.
    pub fn mount_credentials(&mut self, runtime: &RuntimeInfo, host: &HostEnv) -> Result<()> {
        let creds = find_credentials(runtime, host)?;
        self.extra_mounts.push(Mount {
            host_path: creds.file_path.to_string_lossy().into_owned(),
            container_path: creds.mount_path,
            read_only: true,
            propagation: String::new(),
        });
        Ok(())
    }

    fn networking(&self) -> Option<NetworkConfig> {
        let requested = !self.pod_subnet.is_empty()
            || !self.service_subnet.is_empty()
            || self.disable_default_cni
            || !self.ip_family.is_empty()
            || !self.kube_proxy_mode.is_empty()
            || self.api_server_port != 0;

        requested.then(|| NetworkConfig {
            ip_family: self.ip_family.clone(),
            api_server_port: self.api_server_port,
            pod_subnet: self.pod_subnet.clone(),
            service_subnet: self.service_subnet.clone(),
            disable_default_cni: self.disable_default_cni,
            kube_proxy_mode: self.kube_proxy_mode.clone(),
            ..Default::default()
        })
    }
}

/// Node image reference for a Kubernetes version, e.g. `kindest/node:v1.31.0`
pub fn node_image(version: &str) -> String {
    if version.starts_with('v') {
        format!("{}:{}", NODE_IMAGE_REPOSITORY, version)
    } else {
        format!("{}:v{}", NODE_IMAGE_REPOSITORY, version)
    }
}

/// Build the cluster document described by `opts`
pub fn build_config(opts: &ConfigOptions) -> Result<ClusterConfig> {
    if opts.cluster_name.is_empty() {
        return Err(Error::invalid_input("cluster name is required"));
    }

    for (role, count) in [("control-plane", opts.control_planes), ("worker", opts.workers)] {
        if count > MAX_NODES_PER_ROLE {
            return Err(Error::invalid_input(format!(
                "{} nodes requested, at most {} {} nodes are supported",
                count, MAX_NODES_PER_ROLE, role
            )));
        }
    }

    let control_planes = opts.control_planes.max(1) as usize;
    let workers = opts.workers.max(0) as usize;
    let image = if opts.kubernetes_version.is_empty() {
        String::new()
    } else {
        node_image(&opts.kubernetes_version)
    };

    let node = |role: NodeRole| NodeConfig {
        role: role.as_str().to_string(),
        image: image.clone(),
        extra_mounts: opts.extra_mounts.clone(),
        labels: opts.labels.clone(),
        ..Default::default()
    };

    let mut nodes = Vec::with_capacity(control_planes + workers);
    for i in 0..control_planes {
        let mut control_plane = node(NodeRole::ControlPlane);
        if i == INGRESS_NODE_INDEX {
            control_plane.extra_port_mappings = opts.port_mappings.clone();
        }
        nodes.push(control_plane);
    }
    nodes.extend((0..workers).map(|_| node(NodeRole::Worker)));

    Ok(ClusterConfig {
        kind: CLUSTER_KIND.to_string(),
        api_version: CLUSTER_API_VERSION.to_string(),
        name: opts.cluster_name.clone(),
        nodes,
        networking: opts.networking(),
        feature_gates: opts.feature_gates.clone(),
        containerd_config_patches: opts.containerd_patches.clone(),
    })
}

/// Generate a kind cluster configuration as YAML
pub fn generate_config(opts: &ConfigOptions) -> Result<String> {
    let config = build_config(opts)?;
    serde_yaml::to_string(&config).map_err(|e| Error::serialization(e.to_string()))
}

/// Parse a cluster document and check its structural rules.
///
/// Only structure is checked: port conflicts, CIDR overlap and option
/// consistency are left to `kind` itself.
pub fn validate_config(text: &str) -> Result<ClusterConfig> {
    let config: ClusterConfig =
        serde_yaml::from_str(text).map_err(|e| Error::parse(format!("invalid YAML: {}", e)))?;

    if config.kind != CLUSTER_KIND {
        return Err(Error::schema(format!(
            "expected kind {:?}, got {:?}",
            CLUSTER_KIND, config.kind
        )));
    }
    if config.api_version != CLUSTER_API_VERSION {
        return Err(Error::schema(format!(
            "expected apiVersion {:?}, got {:?}",
            CLUSTER_API_VERSION, config.api_version
        )));
    }

    if let Some(node) = config.nodes.iter().find(|n| NodeRole::parse(&n.role).is_none()) {
        return Err(Error::schema(format!(
            "invalid node role {:?}; must be 'control-plane' or 'worker'",
            node.role
        )));
    }
    if !config.nodes.is_empty() && config.count_role(NodeRole::ControlPlane) == 0 {
        return Err(Error::schema("at least one control-plane node is required"));
    }

    Ok(config)
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u16) -> bool {
    *value == 0
}
