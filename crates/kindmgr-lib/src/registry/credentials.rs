//! Registry credential discovery
//!
//! Locates the auth file of the detected runtime (Docker `config.json` or
//! Podman `auth.json`) and reports which registries carry inline auth.

use crate::error::{Error, Result};
use crate::runtime::{HostEnv, RuntimeInfo, RuntimeKind};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::debug;

/// Where the kubelet of a kind node reads image pull credentials from
pub const KUBELET_CONFIG_PATH: &str = "/var/lib/kubelet/config.json";

const DOCKER_CONFIG_FILE: &str = ".docker/config.json";
const PODMAN_AUTH_FILE: &str = ".config/containers/auth.json";

/// Discovered credential file and how its credentials are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
    pub file_path: PathBuf,
    pub registries: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cred_store: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cred_helpers: BTreeMap<String, String>,
    /// True iff neither a credential store nor helpers are configured
    pub inline_auth: bool,
    pub mount_path: String,
    /// Runtime whose file was found (`docker` or `podman`)
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// Shape shared by Docker `config.json` and Podman `auth.json`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AuthFile {
    #[serde(deserialize_with = "null_as_default")]
    auths: HashMap<String, serde_json::Value>,
    #[serde(deserialize_with = "null_as_default")]
    creds_store: String,
    #[serde(deserialize_with = "null_as_default")]
    cred_helpers: BTreeMap<String, String>,
}

/// Treat an explicit `null` like an absent key
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

struct Candidate {
    path: PathBuf,
    source: RuntimeKind,
}

impl Candidate {
    fn new(path: PathBuf, source: RuntimeKind) -> Self {
        Self { path, source }
    }
}

fn candidate_paths(info: &RuntimeInfo, host: &HostEnv) -> Vec<Candidate> {
    let docker_default = || Candidate::new(host.home_path(DOCKER_CONFIG_FILE), RuntimeKind::Docker);
    let podman_default = || Candidate::new(host.home_path(PODMAN_AUTH_FILE), RuntimeKind::Podman);

    let mut candidates = Vec::new();
    match info.runtime {
        RuntimeKind::Podman => {
            if let Some(path) = &host.registry_auth_file {
                candidates.push(Candidate::new(path.clone(), RuntimeKind::Podman));
            }
            if host.os.is_linux() {
                if let Some(xdg) = &host.xdg_runtime_dir {
                    candidates.push(Candidate::new(
                        xdg.join("containers").join("auth.json"),
                        RuntimeKind::Podman,
                    ));
                }
            }
            candidates.push(podman_default());
            // Podman tooling falls back to the Docker file as well
            candidates.push(docker_default());
        }
        RuntimeKind::Docker => {
            if let Some(dir) = &host.docker_config {
                candidates.push(Candidate::new(dir.join("config.json"), RuntimeKind::Docker));
            }
            candidates.push(docker_default());
        }
        RuntimeKind::Unknown => {
            candidates.push(docker_default());
            candidates.push(podman_default());
        }
    }
    candidates
}

/// Find the registry credential file for the detected runtime.
///
/// The first candidate that exists wins. A file that exists but cannot be
/// read or parsed ends the search with an error; later candidates are not
/// tried.
pub fn find_credentials(info: &RuntimeInfo, host: &HostEnv) -> Result<CredentialInfo> {
    let candidates = candidate_paths(info, host);

    for candidate in &candidates {
        if !candidate.path.exists() {
            continue;
        }
        debug!(path = %candidate.path.display(), "Reading credential file");

        let data = std::fs::read_to_string(&candidate.path)?;
        let auth: AuthFile = serde_json::from_str(&data).map_err(|e| {
            Error::parse(format!(
                "credential file {}: {}",
                candidate.path.display(),
                e
            ))
        })?;

        return Ok(describe(candidate, auth));
    }

    let searched: Vec<String> = candidates
        .iter()
        .map(|c| c.path.display().to_string())
        .collect();
    Err(Error::not_found(format!(
        "no registry credentials found; searched paths: {}",
        searched.join(", ")
    )))
}

fn describe(candidate: &Candidate, auth: AuthFile) -> CredentialInfo {
    let mut registries: Vec<String> = auth.auths.into_keys().collect();
    registries.sort();

    let inline_auth = auth.creds_store.is_empty() && auth.cred_helpers.is_empty();

    let mut notes = Vec::new();
    if !auth.creds_store.is_empty() {
        notes.push(format!(
            "Credentials are managed by credential helper {:?} and may not be stored in the file. \
             To use them with kind, export them with 'docker-credential-{} get' into a standalone \
             config.json, or use imagePullSecrets in your manifests.",
            auth.creds_store, auth.creds_store
        ));
    }
    if !auth.cred_helpers.is_empty() {
        let hosts: Vec<&str> = auth.cred_helpers.keys().map(String::as_str).collect();
        notes.push(format!(
            "Per-registry credential helpers are configured for: {}.",
            hosts.join(", ")
        ));
    }
    if !inline_auth && registries.is_empty() {
        notes.push("No inline auth entries found in the config file.".to_string());
    }

    CredentialInfo {
        file_path: candidate.path.clone(),
        registries,
        cred_store: auth.creds_store,
        cred_helpers: auth.cred_helpers,
        inline_auth,
        mount_path: KUBELET_CONFIG_PATH.to_string(),
        source: candidate.source.as_str().to_string(),
        notes: notes.join(" "),
    }
}
