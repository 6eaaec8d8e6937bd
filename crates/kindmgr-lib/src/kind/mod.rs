//! Kind cluster configuration, network advice and lifecycle management

pub mod config;
pub mod manager;
pub mod network;

pub use config::{
    build_config, generate_config, node_image, validate_config, ClusterConfig, ConfigOptions,
    Mount, NetworkConfig, NodeConfig, NodeRole, PortMapping,
};
pub use manager::{ClusterStatus, Manager, NodeStatus};
pub use network::{advise, default_port_mappings, format_network_advice, NetworkAdvice};
