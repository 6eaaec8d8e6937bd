use super::{missing, ToolRegistry, ToolResult};
use crate::registry::{apply_mirror_config, find_credentials, generate_mirror_config, RegistryOverride};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

const OVERRIDES_EXAMPLE: &str = r#"[{"original":"docker.io","mirror":"http://localhost:5000"}]"#;

/// Overrides as a JSON-encoded string or as a literal array
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Overrides {
    Encoded(String),
    List(Vec<RegistryOverride>),
}

/// Arguments of `configure_registry_mirrors`
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfigureMirrorsArgs {
    /// Name of the kind cluster to configure
    pub cluster_name: String,
    /// JSON array of overrides, each with 'original' (e.g. 'docker.io') and 'mirror'
    /// (e.g. 'http://my-proxy:5000'). Example:
    /// [{"original":"docker.io","mirror":"http://localhost:5000"}]
    pub overrides: Overrides,
    /// Also mount discovered host credentials into the nodes (default: false)
    #[serde(default)]
    pub include_credentials: bool,
}

impl Overrides {
    fn into_list(self) -> std::result::Result<Vec<RegistryOverride>, ToolResult> {
        match self {
            Overrides::List(list) => Ok(list),
            Overrides::Encoded(text) => serde_json::from_str(&text).map_err(|e| {
                ToolResult::error(format!(
                    "invalid 'overrides' JSON: {}. Expected: {}",
                    e, OVERRIDES_EXAMPLE
                ))
            }),
        }
    }
}

impl ToolRegistry {
    /// Registry credential file of the detected runtime
    pub async fn detect_credentials(&self) -> ToolResult {
        debug!(tool = "detect_credentials", "Tool called");
        let runtime = self.runtime_info().await;

        match find_credentials(&runtime, &self.host) {
            Ok(creds) => ToolResult::json(&creds),
            Err(e) => ToolResult::error(format!("credential discovery failed: {}", e)),
        }
    }

    pub async fn configure_registry_mirrors(&self, args: ConfigureMirrorsArgs) -> ToolResult {
        info!(tool = "configure_registry_mirrors", cluster = %args.cluster_name, "Tool called");
        if args.cluster_name.is_empty() {
            return missing("cluster_name");
        }

        let overrides = match args.overrides.into_list() {
            Ok(list) if list.is_empty() => {
                return ToolResult::error("at least one registry override is required")
            }
            Ok(list) => list,
            Err(result) => return result,
        };

        let manager = self.manager().await;

        let credentials = if args.include_credentials {
            match find_credentials(manager.runtime(), &self.host) {
                Ok(creds) => Some(creds),
                Err(e) => {
                    warn!(error = %e, "Credential discovery failed, continuing without credentials");
                    None
                }
            }
        } else {
            None
        };

        let config = match generate_mirror_config(&overrides, credentials.as_ref()) {
            Ok(config) => config,
            Err(e) => return ToolResult::error(format!("failed to generate mirror config: {}", e)),
        };

        match apply_mirror_config(&manager, &args.cluster_name, &config).await {
            Ok(lines) => ToolResult::text(format!(
                "Registry mirror configuration applied to cluster {:?}.\n\nResults:\n{}",
                args.cluster_name,
                lines.join("\n")
            )),
            Err(e) => ToolResult::error(format!("failed to apply mirror config: {}", e)),
        }
    }
}
