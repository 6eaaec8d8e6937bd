//! Registry credentials and mirrors

pub mod credentials;
pub mod mirrors;

pub use credentials::{find_credentials, CredentialInfo, KUBELET_CONFIG_PATH};
pub use mirrors::{
    apply_mirror_config, generate_hosts_toml, generate_mirror_config, MirrorConfig, NodeCommand,
    NodeSelector, RegistryOverride, WRITE_FILE_SCRIPT,
};
