use super::{missing, ToolRegistry, ToolResult};
use crate::error::{Error, Result};
use crate::kind::config::MAX_NODES_PER_ROLE;
use crate::kind::{generate_config, ConfigOptions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Arguments of `generate_cluster_config`
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GenerateClusterConfigArgs {
    /// Name of the kind cluster
    pub name: String,
    /// Number of worker nodes (default: 0)
    pub workers: Option<i64>,
    /// Number of control-plane nodes (default: 1; >1 for HA)
    pub control_planes: Option<i64>,
    /// Kubernetes version of the kindest/node image, e.g. '1.31.0'. Empty for the kind default.
    #[serde(default)]
    pub kubernetes_version: String,
    /// Detect host registry credentials and mount them into every node
    #[serde(default)]
    pub mount_credentials: bool,
    /// Map host ports 80 and 443 to the first control-plane node
    #[serde(default)]
    pub expose_ingress: bool,
    /// Pod subnet CIDR, e.g. '10.244.0.0/16'
    #[serde(default)]
    pub pod_subnet: String,
    /// Service subnet CIDR, e.g. '10.96.0.0/12'
    #[serde(default)]
    pub service_subnet: String,
    /// Disable the default CNI to install another one such as Cilium
    #[serde(default)]
    pub disable_default_cni: bool,
    /// IP family: 'ipv4', 'ipv6' or 'dual'
    #[serde(default)]
    pub ip_family: String,
    /// kube-proxy mode: 'iptables', 'ipvs', 'nftables' or 'none'
    #[serde(default)]
    pub kube_proxy_mode: String,
    /// Pin the API server to this host port, e.g. 6443. Default: random.
    pub api_server_port: Option<u16>,
}

/// Arguments of `create_cluster`
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct CreateClusterArgs {
    /// Name of the kind cluster to create
    pub name: String,
    /// kind cluster configuration YAML (from generate_cluster_config)
    pub config_yaml: String,
}

/// Arguments of tools addressing one cluster by name
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ClusterNameArgs {
    /// Name of the kind cluster
    pub name: String,
}

/// Arguments of `get_kubeconfig`
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct KubeconfigArgs {
    /// Name of the kind cluster
    pub name: String,
    /// Use container IPs instead of localhost (default: false)
    #[serde(default)]
    pub internal: bool,
}

#[derive(Serialize)]
struct ClusterList<'a> {
    clusters: &'a [String],
    count: usize,
}

/// Validate a requested node count; `None` selects `default`
fn node_count(field: &str, value: Option<i64>, default: i64) -> Result<i64> {
    match value {
        None => Ok(default),
        Some(n) if n < 0 => Err(Error::invalid_input(format!(
            "'{}' must not be negative, got {}",
            field, n
        ))),
        Some(n) if n > MAX_NODES_PER_ROLE => Err(Error::invalid_input(format!(
            "'{}' must be at most {}, got {}",
            field, MAX_NODES_PER_ROLE, n
        ))),
        Some(n) => Ok(n),
    }
}

impl ToolRegistry {
    /// Render a cluster document for review before creation
    pub async fn generate_cluster_config(&self, args: GenerateClusterConfigArgs) -> ToolResult {
        info!(tool = "generate_cluster_config", cluster = %args.name, "Tool called");
        if args.name.is_empty() {
            return missing("name");
        }

        let mut opts = ConfigOptions::new(args.name.clone());
        let counts = node_count("workers", args.workers, 0).and_then(|workers| {
            node_count("control_planes", args.control_planes, 1).map(|cp| (workers, cp))
        });
        match counts {
            Ok((workers, control_planes)) => {
                opts.workers = workers;
                opts.control_planes = control_planes;
            }
            Err(e) => return ToolResult::error(e.to_string()),
        }
        opts.kubernetes_version = args.kubernetes_version;
        opts.pod_subnet = args.pod_subnet;
        opts.service_subnet = args.service_subnet;
        opts.disable_default_cni = args.disable_default_cni;
        opts.ip_family = args.ip_family;
        opts.kube_proxy_mode = args.kube_proxy_mode;
        opts.api_server_port = args.api_server_port.unwrap_or(0);

        if args.mount_credentials || args.expose_ingress {
            let runtime = self.runtime_info().await;

            if args.expose_ingress {
                opts.expose_ingress(&runtime);
            }
            if args.mount_credentials {
                if let Err(e) = opts.mount_credentials(&runtime, &self.host) {
                    warn!(error = %e, "Credential discovery failed, generating without mount");
                }
            }
        }

        match generate_config(&opts) {
            Ok(yaml) => ToolResult::text(format!(
                "Generated kind cluster config for {:?}:\n\n```yaml\n{}```\n\n\
                 Review the configuration above, then use the 'create_cluster' tool with this YAML to create the cluster.",
                args.name, yaml
            )),
            Err(e) => ToolResult::error(format!("failed to generate config: {}", e)),
        }
    }

    pub async fn create_cluster(&self, args: CreateClusterArgs) -> ToolResult {
        info!(tool = "create_cluster", cluster = %args.name, "Tool called");
        if args.name.is_empty() {
            return missing("name");
        }
        if args.config_yaml.is_empty() {
            return missing("config_yaml");
        }

        match self.manager().await.create_cluster(&args.name, &args.config_yaml).await {
            Ok(output) => ToolResult::text(format!(
                "Cluster {:?} created successfully.\n\n{}",
                args.name, output
            )),
            Err(e) => ToolResult::error(format!("failed to create cluster: {}", e)),
        }
    }

    pub async fn delete_cluster(&self, args: ClusterNameArgs) -> ToolResult {
        info!(tool = "delete_cluster", cluster = %args.name, "Tool called");
        if args.name.is_empty() {
            return missing("name");
        }

        match self.manager().await.delete_cluster(&args.name).await {
            Ok(output) => ToolResult::text(format!(
                "Cluster {:?} deleted successfully.\n\n{}",
                args.name, output
            )),
            Err(e) => ToolResult::error(format!("failed to delete cluster: {}", e)),
        }
    }

    pub async fn list_clusters(&self) -> ToolResult {
        debug!(tool = "list_clusters", "Tool called");
        match self.manager().await.list_clusters().await {
            Ok(clusters) if clusters.is_empty() => ToolResult::text("No Kind clusters found."),
            Ok(clusters) => ToolResult::json(&ClusterList {
                clusters: &clusters,
                count: clusters.len(),
            }),
            Err(e) => ToolResult::error(format!("failed to list clusters: {}", e)),
        }
    }

    pub async fn get_cluster_status(&self, args: ClusterNameArgs) -> ToolResult {
        debug!(tool = "get_cluster_status", cluster = %args.name, "Tool called");
        if args.name.is_empty() {
            return missing("name");
        }

        match self.manager().await.get_cluster_status(&args.name).await {
            Ok(status) => ToolResult::json(&status),
            Err(e) => ToolResult::error(format!("failed to get cluster status: {}", e)),
        }
    }

    pub async fn get_kubeconfig(&self, args: KubeconfigArgs) -> ToolResult {
        debug!(tool = "get_kubeconfig", cluster = %args.name, internal = args.internal, "Tool called");
        if args.name.is_empty() {
            return missing("name");
        }

        match self
            .manager()
            .await
            .get_kubeconfig(&args.name, args.internal)
            .await
        {
            Ok(kubeconfig) => ToolResult::text(format!(
                "Kubeconfig for cluster {:?}:\n\n```yaml\n{}```",
                args.name, kubeconfig
            )),
            Err(e) => ToolResult::error(format!("failed to get kubeconfig: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::exec::testing::FakeRunner;
    use serde_json::{json, Value};

    #[test]
    fn test_argument_schemas() {
        let generate = schema::<GenerateClusterConfigArgs>();
        assert_eq!(generate["type"], "object");
        assert_eq!(generate["required"], json!(["name"]));
        assert!(generate["properties"]["workers"].is_object());
        assert!(generate["properties"]["api_server_port"].is_object());

        let create = schema::<CreateClusterArgs>();
        assert_eq!(create["required"], json!(["name", "config_yaml"]));
        assert_eq!(
            create["properties"]["config_yaml"]["description"],
            "kind cluster configuration YAML (from generate_cluster_config)"
        );

        let kubeconfig = schema::<KubeconfigArgs>();
        assert_eq!(kubeconfig["required"], json!(["name"]));
    }

    #[test]
    fn test_non_integer_node_counts_do_not_decode() {
        for payload in [
            json!({"name": "dev", "workers": 2.5}),
            json!({"name": "dev", "workers": 1e19}),
            json!({"name": "dev", "control_planes": "two"}),
            json!({"name": "dev", "api_server_port": 70000}),
        ] {
            assert!(serde_json::from_value::<GenerateClusterConfigArgs>(payload).is_err());
        }
        assert!(serde_json::from_value::<CreateClusterArgs>(json!({"name": "dev"})).is_err());
    }

    #[tokio::test]
    async fn test_generate_cluster_config() {
        let (_dir, host) = linux_host();
        let (runner, tools) = registry(docker_runner(), host);

        let result = tools
            .generate_cluster_config(args(json!({
                "name": "demo", "control_planes": 3, "workers": 2, "kubernetes_version": "1.31.0"
            })))
            .await;

        assert!(!result.is_error);
        assert!(result.text.starts_with("Generated kind cluster config for \"demo\""));
        assert!(result.text.contains("```yaml\n"));
        assert_eq!(result.text.matches("role: control-plane").count(), 3);
        assert_eq!(result.text.matches("role: worker").count(), 2);
        assert!(result.text.contains("kindest/node:v1.31.0"));

        // Plain generation needs no runtime
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generate_requires_name() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(FakeRunner::new(), host);

        let result = tools.generate_cluster_config(args(json!({"name": ""}))).await;
        assert!(result.is_error);
        assert_eq!(result.text, "parameter 'name' is required");
    }

    #[tokio::test]
    async fn test_generate_rejects_out_of_range_node_counts() {
        let (_dir, host) = linux_host();
        let (runner, tools) = registry(docker_runner(), host);

        for (payload, field) in [
            (json!({"name": "dev", "workers": -1}), "workers"),
            (json!({"name": "dev", "control_planes": -2}), "control_planes"),
            (json!({"name": "dev", "workers": 101}), "workers"),
            (json!({"name": "dev", "workers": i64::MAX}), "workers"),
            (json!({"name": "dev", "control_planes": 1_000_000_000}), "control_planes"),
        ] {
            let result = tools.generate_cluster_config(args(payload)).await;
            assert!(result.is_error);
            assert!(result.text.starts_with("invalid input:"), "{}", result.text);
            assert!(result.text.contains(field));
        }
        assert!(runner.calls().is_empty());

        let result = tools
            .generate_cluster_config(args(json!({"name": "dev", "control_planes": 0, "workers": 100})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.text.matches("role: control-plane").count(), 1);
        assert_eq!(result.text.matches("role: worker").count(), 100);
    }

    #[tokio::test]
    async fn test_generate_with_ingress_and_credentials() {
        let (_dir, host) = linux_host();
        let config = host.home_path(".docker/config.json");
        std::fs::create_dir_all(config.parent().unwrap()).unwrap();
        std::fs::write(&config, r#"{"auths":{"ghcr.io":{"auth":"dXNlcjpwYXNz"}}}"#).unwrap();
        let (_, tools) = registry(docker_runner(), host);

        let result = tools
            .generate_cluster_config(args(json!({
                "name": "dev", "expose_ingress": true, "mount_credentials": true, "api_server_port": 6443
            })))
            .await;

        assert!(!result.is_error);
        assert!(result.text.contains("hostPort: 80"));
        assert!(result.text.contains("hostPort: 443"));
        // Native Linux binds on every interface
        assert!(result.text.contains("listenAddress: 0.0.0.0"));
        assert!(result.text.contains("containerPath: /var/lib/kubelet/config.json"));
        assert!(result.text.contains("apiServerPort: 6443"));
    }

    #[tokio::test]
    async fn test_generate_without_credentials_still_succeeds() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(docker_runner(), host);

        let result = tools
            .generate_cluster_config(args(json!({"name": "dev", "mount_credentials": true})))
            .await;
        assert!(!result.is_error);
        assert!(!result.text.contains("extraMounts"));
    }

    #[tokio::test]
    async fn test_create_cluster() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(
            docker_runner().respond("kind", &["create", "cluster"], " ✓ Ensuring node image\n"),
            host,
        );
        let yaml = "kind: Cluster\napiVersion: kind.x-k8s.io/v1alpha4\nnodes:\n- role: control-plane\n";

        let result = tools
            .create_cluster(args(json!({"name": "dev", "config_yaml": yaml})))
            .await;
        assert!(!result.is_error, "{}", result.text);
        assert!(result.text.starts_with("Cluster \"dev\" created successfully."));
        assert!(result.text.contains("Ensuring node image"));
    }

    #[tokio::test]
    async fn test_create_cluster_failures_are_error_results() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(
            docker_runner().fail("kind", &["create", "cluster"], "ERROR: failed to create cluster"),
            host,
        );

        let result = tools
            .create_cluster(args(json!({"name": "dev", "config_yaml": ""})))
            .await;
        assert_eq!(result.text, "parameter 'config_yaml' is required");

        let result = tools
            .create_cluster(args(json!({"name": "dev", "config_yaml": "kind: Pod\n"})))
            .await;
        assert!(result.is_error);
        assert!(result.text.contains("invalid config"));

        let yaml = "kind: Cluster\napiVersion: kind.x-k8s.io/v1alpha4\n";
        let result = tools
            .create_cluster(args(json!({"name": "dev", "config_yaml": yaml})))
            .await;
        assert!(result.is_error);
        assert!(result.text.contains("ERROR: failed to create cluster"));
    }

    #[tokio::test]
    async fn test_delete_cluster() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(
            docker_runner().respond("kind", &["delete", "cluster"], "Deleting cluster \"dev\" ...\n"),
            host,
        );

        let result = tools.delete_cluster(args(json!({"name": "dev"}))).await;
        assert!(result.text.starts_with("Cluster \"dev\" deleted successfully."));

        let result = tools.delete_cluster(args(json!({"name": ""}))).await;
        assert!(result.is_error);
        assert_eq!(result.text, "parameter 'name' is required");
    }

    #[tokio::test]
    async fn test_list_clusters() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(
            docker_runner().respond("kind", &["get", "clusters"], "alpha\nbeta\n"),
            host,
        );

        let result = tools.list_clusters().await;
        let list: Value = serde_json::from_str(&result.text).unwrap();
        assert_eq!(list, json!({"clusters": ["alpha", "beta"], "count": 2}));
    }

    #[tokio::test]
    async fn test_list_clusters_empty() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(
            docker_runner().respond("kind", &["get", "clusters"], "No kind clusters found.\n"),
            host,
        );

        let result = tools.list_clusters().await;
        assert!(!result.is_error);
        assert_eq!(result.text, "No Kind clusters found.");
    }

    #[tokio::test]
    async fn test_cluster_status() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(
            docker_runner()
                .respond("kind", &["get", "nodes"], "dev-control-plane\ndev-worker\n")
                .respond("docker", &["inspect"], "running\n"),
            host,
        );

        let result = tools.get_cluster_status(args(json!({"name": "dev"}))).await;
        let status: Value = serde_json::from_str(&result.text).unwrap();
        assert_eq!(status["name"], "dev");
        assert_eq!(status["nodes"][0]["role"], "control-plane");
        assert_eq!(status["nodes"][1]["role"], "worker");
        assert_eq!(status["nodes"][1]["status"], "running");
    }

    #[tokio::test]
    async fn test_cluster_status_not_found() {
        let (_dir, host) = linux_host();
        let (_, tools) = registry(
            docker_runner().respond(
                "kind",
                &["get", "nodes"],
                "No kind nodes found for cluster \"ghost\".\n",
            ),
            host,
        );

        let result = tools.get_cluster_status(args(json!({"name": "ghost"}))).await;
        assert!(result.is_error);
        assert!(result.text.contains("not found"));
    }

    #[tokio::test]
    async fn test_get_kubeconfig() {
        let (_dir, host) = linux_host();
        let (runner, tools) = registry(
            docker_runner().respond("kind", &["get", "kubeconfig"], "apiVersion: v1\nkind: Config\n"),
            host,
        );

        let result = tools
            .get_kubeconfig(args(json!({"name": "dev", "internal": true})))
            .await;
        assert!(result.text.starts_with("Kubeconfig for cluster \"dev\""));
        assert!(result.text.contains("kind: Config"));
        assert!(runner
            .calls()
            .contains(&"kind get kubeconfig --name dev --internal".to_string()));
    }
}
