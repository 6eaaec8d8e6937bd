//! kindmgr - kind cluster management from the terminal
//!
//! Drives the same library as the MCP server: runtime detection, config
//! generation, cluster lifecycle, credential discovery and registry mirrors.

mod commands;
mod output;
mod session;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commands::{cluster, environment, registry};
use kindmgr_lib::observability;
use std::path::PathBuf;
use std::time::Duration;

/// kind cluster manager CLI
#[derive(Parser)]
#[command(name = "kindmgr")]
#[command(author, version, about = "Manage kind clusters on Docker or Podman", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Log level written to stderr (debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// Kill external commands running longer than this many seconds (0 disables)
    #[arg(
        long,
        env = "KIND_MANAGER_COMMAND_TIMEOUT_SECS",
        default_value_t = 600,
        global = true
    )]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the host OS, container runtime and networking constraints
    Detect,

    /// Generate or validate kind cluster configurations
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Create, delete and inspect kind clusters
    #[command(subcommand)]
    Cluster(ClusterCommands),

    /// Print the kubeconfig of a cluster
    Kubeconfig {
        /// Cluster name
        name: String,

        /// Use container IPs instead of localhost
        #[arg(long)]
        internal: bool,
    },

    /// Locate host registry credentials
    Credentials,

    /// Point a running cluster at registry mirrors
    Mirrors {
        /// Cluster name
        #[arg(long)]
        cluster: String,

        /// Registry override as REGISTRY=MIRROR, e.g. docker.io=localhost:5000
        #[arg(long = "mirror", value_name = "REGISTRY=MIRROR", required = true)]
        mirrors: Vec<String>,

        /// Mount inline host credentials into the nodes
        #[arg(long)]
        include_credentials: bool,

        /// Print the planned node commands without running them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a cluster configuration
    Generate(GenerateArgs),

    /// Validate a cluster configuration file
    Validate {
        /// Path to the configuration YAML
        file: PathBuf,
    },
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Cluster name
    pub name: String,

    /// Number of worker nodes
    #[arg(long, default_value_t = 0)]
    pub workers: u32,

    /// Number of control-plane nodes (>1 for HA)
    #[arg(long, default_value_t = 1)]
    pub control_planes: u32,

    /// Kubernetes version of the node image, e.g. 1.31.0
    #[arg(long)]
    pub kubernetes_version: Option<String>,

    /// Map host ports 80 and 443 to the first control-plane node
    #[arg(long)]
    pub expose_ingress: bool,

    /// Mount detected registry credentials into every node
    #[arg(long)]
    pub mount_credentials: bool,

    /// Pod subnet CIDR
    #[arg(long)]
    pub pod_subnet: Option<String>,

    /// Service subnet CIDR
    #[arg(long)]
    pub service_subnet: Option<String>,

    /// Disable the default CNI
    #[arg(long)]
    pub disable_default_cni: bool,

    /// IP family (ipv4, ipv6, dual)
    #[arg(long)]
    pub ip_family: Option<String>,

    /// kube-proxy mode (iptables, ipvs, nftables, none)
    #[arg(long)]
    pub kube_proxy_mode: Option<String>,

    /// Pin the API server to this host port
    #[arg(long)]
    pub api_server_port: Option<u16>,

    /// Write the YAML to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ClusterCommands {
    /// Create a cluster from a configuration file
    Create {
        /// Cluster name
        name: String,

        /// Path to the configuration YAML
        #[arg(long, short)]
        config: PathBuf,
    },

    /// Delete a cluster
    Delete {
        /// Cluster name
        name: String,
    },

    /// List clusters
    List,

    /// Show node roles and container states
    Status {
        /// Cluster name
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    observability::init_logging(&cli.log_level).context("initializing logging")?;

    let timeout = (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs));
    let session = session::Session::new(timeout);

    match cli.command {
        Commands::Detect => {
            environment::detect(&session, cli.format).await?;
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Generate(args) => {
                cluster::generate_config(&session, args, cli.format).await?;
            }
            ConfigCommands::Validate { file } => {
                cluster::validate_config(&file, cli.format)?;
            }
        },
        Commands::Cluster(cluster_cmd) => match cluster_cmd {
            ClusterCommands::Create { name, config } => {
                cluster::create_cluster(&session, &name, &config, cli.format).await?;
            }
            ClusterCommands::Delete { name } => {
                cluster::delete_cluster(&session, &name, cli.format).await?;
            }
            ClusterCommands::List => {
                cluster::list_clusters(&session, cli.format).await?;
            }
            ClusterCommands::Status { name } => {
                cluster::cluster_status(&session, &name, cli.format).await?;
            }
        },
        Commands::Kubeconfig { name, internal } => {
            cluster::kubeconfig(&session, &name, internal).await?;
        }
        Commands::Credentials => {
            registry::credentials(&session, cli.format).await?;
        }
        Commands::Mirrors {
            cluster,
            mirrors,
            include_credentials,
            dry_run,
        } => {
            let overrides = registry::parse_overrides(&mirrors)?;
            let options = registry::MirrorOptions {
                include_credentials,
                dry_run,
            };
            registry::mirrors(&session, &cluster, &overrides, options, cli.format).await?;
        }
    }

    Ok(())
}
