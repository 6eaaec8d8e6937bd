//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// `LOG_LEVEL`: debug, info, warn or error
    pub log_level: String,

    /// `KIND_MANAGER_COMMAND_TIMEOUT_SECS`: budget of one tool call, 0 for none
    pub command_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(std::env::vars().collect())
    }

    /// Load configuration from an explicit set of environment variables
    pub fn from_env(env: HashMap<String, String>) -> Result<Self> {
        let config = config::Config::builder()
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("command_timeout_secs", DEFAULT_COMMAND_TIMEOUT_SECS)?
            .add_source(
                config::Environment::default()
                    .source(Some(unprefixed(&env, "LOG_LEVEL"))),
            )
            .add_source(
                config::Environment::with_prefix("KIND_MANAGER")
                    .try_parsing(true)
                    .source(Some(env)),
            )
            .build()
            .context("building server configuration")?;

        config
            .try_deserialize()
            .context("invalid server configuration")
    }

    /// Per-call time budget; `None` when disabled
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }
}

/// Only `key` from the unprefixed environment
fn unprefixed(env: &HashMap<String, String>, key: &str) -> HashMap<String, String> {
    env.get(key)
        .map(|value| HashMap::from([(key.to_string(), value.clone())]))
        .unwrap_or_default()
}
