//! Cluster configuration and lifecycle commands

use anyhow::{Context, Result};
use colored::Colorize;
use kindmgr_lib::kind::{self, build_config, ClusterConfig, ConfigOptions};
use serde_json::json;
use std::path::Path;
use tabled::Tabled;
use tracing::warn;

use crate::output::{
    color_status, print_json, print_success, print_table, print_warning, OutputFormat,
};
use crate::session::Session;
use crate::GenerateArgs;

/// Row for the node table of a validated config
#[derive(Tabled)]
struct ConfigNodeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "Mounts")]
    mounts: usize,
}

/// Row for the cluster list table
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Cluster")]
    name: String,
}

/// Row for the cluster status table
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Translate command-line flags into generator options
fn options_from_args(args: &GenerateArgs) -> ConfigOptions {
    let mut opts = ConfigOptions::new(args.name.clone());
    opts.workers = i64::from(args.workers);
    opts.control_planes = i64::from(args.control_planes);
    opts.kubernetes_version = args.kubernetes_version.clone().unwrap_or_default();
    opts.pod_subnet = args.pod_subnet.clone().unwrap_or_default();
    opts.service_subnet = args.service_subnet.clone().unwrap_or_default();
    opts.disable_default_cni = args.disable_default_cni;
    opts.ip_family = args.ip_family.clone().unwrap_or_default();
    opts.kube_proxy_mode = args.kube_proxy_mode.clone().unwrap_or_default();
    opts.api_server_port = args.api_server_port.unwrap_or(0);
    opts
}

/// Generate a cluster configuration
pub async fn generate_config(
    session: &Session,
    args: GenerateArgs,
    format: OutputFormat,
) -> Result<()> {
    let mut opts = options_from_args(&args);

    if args.expose_ingress || args.mount_credentials {
        let runtime = session.detect().await;

        if args.expose_ingress {
            opts.expose_ingress(&runtime);
        }
        if args.mount_credentials {
            if let Err(e) = opts.mount_credentials(&runtime, session.host()) {
                warn!(error = %e, "Credential discovery failed");
                print_warning(&format!("Credentials not mounted: {}", e));
            }
        }
    }

    if let Some(path) = &args.output {
        let yaml = kind::generate_config(&opts)?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        print_success(&format!(
            "Wrote config for cluster {} to {}",
            args.name.cyan(),
            path.display()
        ));
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_json(&build_config(&opts)?)?,
        OutputFormat::Table => print!("{}", kind::generate_config(&opts)?),
    }
    Ok(())
}

/// Validate a configuration file
pub fn validate_config(file: &Path, format: OutputFormat) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let config = kind::validate_config(&text)
        .with_context(|| format!("{} is not a valid kind config", file.display()))?;

    match format {
        OutputFormat::Json => print_json(&config)?,
        OutputFormat::Table => {
            print_success(&format!("{} is a valid kind config", file.display()));
            if !config.name.is_empty() {
                println!("Cluster name: {}", config.name.cyan());
            }
            print_table(&config_rows(&config), "No nodes declared; kind will create a single control-plane node");
        }
    }
    Ok(())
}

fn config_rows(config: &ClusterConfig) -> Vec<ConfigNodeRow> {
    config
        .nodes
        .iter()
        .enumerate()
        .map(|(index, node)| ConfigNodeRow {
            index,
            role: node.role.clone(),
            image: if node.image.is_empty() {
                "(default)".to_string()
            } else {
                node.image.clone()
            },
            ports: node
                .extra_port_mappings
                .iter()
                .map(|p| format!("{}->{}", p.host_port, p.container_port))
                .collect::<Vec<_>>()
                .join(", "),
            mounts: node.extra_mounts.len(),
        })
        .collect()
}

/// Create a cluster from a configuration file
pub async fn create_cluster(
    session: &Session,
    name: &str,
    config: &Path,
    format: OutputFormat,
) -> Result<()> {
    let yaml = std::fs::read_to_string(config)
        .with_context(|| format!("Failed to read {}", config.display()))?;

    let manager = session.manager().await;
    let output = manager.create_cluster(name, &yaml).await?;

    match format {
        OutputFormat::Json => print_json(&json!({"cluster": name, "created": true, "output": output}))?,
        OutputFormat::Table => {
            if !output.trim().is_empty() {
                println!("{}", output.trim_end());
            }
            print_success(&format!("Cluster {} created", name.cyan()));
        }
    }
    Ok(())
}

/// Delete a cluster
pub async fn delete_cluster(session: &Session, name: &str, format: OutputFormat) -> Result<()> {
    let output = session.manager().await.delete_cluster(name).await?;

    match format {
        OutputFormat::Json => print_json(&json!({"cluster": name, "deleted": true, "output": output}))?,
        OutputFormat::Table => print_success(&format!("Cluster {} deleted", name.cyan())),
    }
    Ok(())
}

/// List clusters
pub async fn list_clusters(session: &Session, format: OutputFormat) -> Result<()> {
    let clusters = session.manager().await.list_clusters().await?;

    match format {
        OutputFormat::Json => print_json(&json!({"clusters": clusters, "count": clusters.len()}))?,
        OutputFormat::Table => {
            let rows: Vec<ClusterRow> = clusters
                .into_iter()
                .map(|name| ClusterRow { name })
                .collect();
            print_table(&rows, "No kind clusters found.");
        }
    }
    Ok(())
}

/// Show node roles and container states
pub async fn cluster_status(session: &Session, name: &str, format: OutputFormat) -> Result<()> {
    let status = session.manager().await.get_cluster_status(name).await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("Cluster: {}", status.name.cyan().bold());
            let rows: Vec<NodeRow> = status
                .nodes
                .iter()
                .map(|n| NodeRow {
                    name: n.name.clone(),
                    role: n.role.to_string(),
                    status: color_status(&n.status),
                })
                .collect();
            print_table(&rows, "No nodes found");
        }
    }
    Ok(())
}

/// Print a cluster's kubeconfig
pub async fn kubeconfig(session: &Session, name: &str, internal: bool) -> Result<()> {
    let config = session.manager().await.get_kubeconfig(name, internal).await?;
    print!("{}", config);
    if !config.ends_with('\n') {
        println!();
    }
    Ok(())
}
