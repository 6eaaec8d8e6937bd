//! Container runtime and backend detection
//!
//! Checks Docker first and Podman second. Each check runs the runtime's
//! `info` subcommand and classifies the backend (Docker Desktop, Colima,
//! WSL, native Linux, ...) from the JSON it prints plus a few host hints.

use super::{HostEnv, OsInfo};
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

const NO_RUNTIME_MESSAGE: &str = "no container runtime detected; install Docker or Podman";
const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";
const WINDOWS_DOCKER_PIPE: &str = r"\\.\pipe\docker_engine";

/// Container runtime family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Docker,
    Podman,
    Unknown,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
            RuntimeKind::Unknown => "unknown",
        }
    }

    /// Executable used for `inspect` and `exec` against node containers.
    /// Kind itself assumes Docker, so an unknown runtime falls back to it.
    pub fn binary(&self) -> &'static str {
        match self {
            RuntimeKind::Podman => "podman",
            RuntimeKind::Docker | RuntimeKind::Unknown => "docker",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mechanism delivering the container engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    DockerDesktop,
    Colima,
    Wsl,
    PodmanMachine,
    Native,
    RancherDesktop,
    Lima,
    #[serde(rename = "orbstack")]
    OrbStack,
    Rootless,
    Unknown,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::DockerDesktop => "docker-desktop",
            Backend::Colima => "colima",
            Backend::Wsl => "wsl",
            Backend::PodmanMachine => "podman-machine",
            Backend::Native => "native",
            Backend::RancherDesktop => "rancher-desktop",
            Backend::Lima => "lima",
            Backend::OrbStack => "orbstack",
            Backend::Rootless => "rootless",
            Backend::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one detection pass. Never cached; every tool call redetects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub runtime: RuntimeKind,
    pub backend: Backend,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub socket_path: String,
    pub os: OsInfo,
    pub available: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl RuntimeInfo {
    /// Result used when neither runtime answered
    pub fn unavailable(os: OsInfo) -> Self {
        Self {
            runtime: RuntimeKind::Unknown,
            backend: Backend::Unknown,
            version: String::new(),
            socket_path: String::new(),
            os,
            available: false,
            error: NO_RUNTIME_MESSAGE.to_string(),
        }
    }

    /// Minimal available result, mostly useful for tests and callers that
    /// already know which runtime to drive
    pub fn for_runtime(runtime: RuntimeKind, os: OsInfo) -> Self {
        Self {
            runtime,
            backend: Backend::Unknown,
            version: String::new(),
            socket_path: String::new(),
            os,
            available: true,
            error: String::new(),
        }
    }
}

/// Subset of `docker info --format '{{json .}}'`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DockerInfo {
    #[serde(rename = "ServerVersion")]
    server_version: Option<String>,
    #[serde(rename = "OperatingSystem")]
    operating_system: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "SecurityOptions")]
    security_options: Option<Vec<String>>,
    #[serde(rename = "ServerErrors")]
    server_errors: Option<Vec<String>>,
}

/// Subset of `podman info --format json`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodmanInfo {
    host: PodmanHost,
    version: Option<PodmanVersion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodmanHost {
    #[serde(rename = "remoteSocket")]
    remote_socket: Option<PodmanSocket>,
    version: Option<PodmanVersion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodmanSocket {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodmanVersion {
    #[serde(rename = "Version")]
    version: Option<String>,
}

/// Lower-cased fields of the Docker engine report used for classification
struct EngineSignals {
    os: String,
    name: String,
    security: Vec<String>,
}

impl EngineSignals {
    fn from_info(info: &DockerInfo) -> Self {
        Self {
            os: info.operating_system.as_deref().unwrap_or_default().to_lowercase(),
            name: info.name.as_deref().unwrap_or_default().to_lowercase(),
            security: info
                .security_options
                .iter()
                .flatten()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }
}

type EngineRule = (fn(&EngineSignals) -> bool, Backend);

/// Engine report rules, evaluated in order. `colima` must precede `lima`.
const ENGINE_RULES: &[EngineRule] = &[
    (|s| s.os.contains("docker desktop"), Backend::DockerDesktop),
    (
        |s| s.os.contains("orbstack") || s.name.contains("orbstack"),
        Backend::OrbStack,
    ),
    (
        |s| s.os.contains("colima") || s.name.contains("colima"),
        Backend::Colima,
    ),
    (|s| s.name.contains("rancher"), Backend::RancherDesktop),
    (|s| s.name.contains("lima"), Backend::Lima),
    (
        |s| s.security.iter().any(|o| o.contains("rootless")),
        Backend::Rootless,
    ),
];

/// Socket path fragments, evaluated in order after the engine rules
const SOCKET_RULES: &[(&str, Backend)] = &[
    (".colima", Backend::Colima),
    (".orbstack", Backend::OrbStack),
    (".lima", Backend::Lima),
    (".rd", Backend::RancherDesktop),
];

fn classify_docker_backend(info: &DockerInfo, socket_path: &str, host: &HostEnv) -> Backend {
    let signals = EngineSignals::from_info(info);

    if let Some((_, backend)) = ENGINE_RULES.iter().find(|(matches, _)| matches(&signals)) {
        return *backend;
    }

    if let Some((_, backend)) = SOCKET_RULES
        .iter()
        .find(|(fragment, _)| socket_path.contains(fragment))
    {
        return *backend;
    }

    if host.os.is_linux() {
        if host.is_wsl() {
            return Backend::Wsl;
        }
        return Backend::Native;
    }

    // macOS and Windows without any other hint
    Backend::DockerDesktop
}

fn classify_podman_backend(host: &HostEnv) -> Backend {
    if host.os.is_macos() || host.os.is_windows() {
        // Podman always runs inside a machine VM off Linux
        Backend::PodmanMachine
    } else if host.os.is_linux() {
        if host.is_wsl() {
            Backend::Wsl
        } else {
            Backend::Native
        }
    } else {
        Backend::Unknown
    }
}

/// Resolve the Docker daemon socket for this host
pub fn docker_socket_path(host: &HostEnv) -> String {
    if let Some(docker_host) = &host.docker_host {
        return docker_host
            .strip_prefix("unix://")
            .unwrap_or(docker_host)
            .to_string();
    }

    if host.os.is_windows() {
        return WINDOWS_DOCKER_PIPE.to_string();
    }

    let candidates = if host.os.is_macos() {
        vec![
            host.home_path(".colima/default/docker.sock"),
            host.home_path(".orbstack/run/docker.sock"),
            host.home_path(".docker/run/docker.sock"),
            host.home_path(".rd/docker.sock"),
            DEFAULT_DOCKER_SOCKET.into(),
        ]
    } else if host.os.is_linux() {
        let mut candidates = Vec::new();
        if let Some(xdg) = &host.xdg_runtime_dir {
            candidates.push(xdg.join("docker.sock"));
        }
        candidates.push(DEFAULT_DOCKER_SOCKET.into());
        candidates.push(host.home_path(".docker/run/docker.sock"));
        candidates
    } else {
        Vec::new()
    };

    candidates
        .into_iter()
        .find(|c| c.exists())
        .map(|c| c.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_DOCKER_SOCKET.to_string())
}

/// Detects the container runtime and backend
pub struct Detector {
    runner: Arc<dyn CommandRunner>,
    host: HostEnv,
}

impl Detector {
    pub fn with_host(runner: Arc<dyn CommandRunner>, host: HostEnv) -> Self {
        Self { runner, host }
    }

    /// Detect the active runtime. Never fails: an absent runtime yields an
    /// unavailable result carrying a diagnostic message.
    pub async fn detect(&self) -> RuntimeInfo {
        if self.runner.look_path("docker").is_some() {
            match self.detect_docker().await {
                Ok(info) => return info,
                Err(e) => debug!(error = %e, "Docker detection failed, trying Podman"),
            }
        }

        if self.runner.look_path("podman").is_some() {
            match self.detect_podman().await {
                Ok(info) => return info,
                Err(e) => debug!(error = %e, "Podman detection failed"),
            }
        }

        info!("No container runtime detected");
        RuntimeInfo::unavailable(self.host.os.clone())
    }

    async fn detect_docker(&self) -> Result<RuntimeInfo> {
        let args = vec![
            "info".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let output = self
            .runner
            .run("docker", &args)
            .await?
            .into_result("docker info")?;

        let docker_info: DockerInfo = serde_json::from_str(output.trim())
            .map_err(|e| Error::parse(format!("docker info output: {}", e)))?;

        if let Some(errors) = docker_info.server_errors.as_ref().filter(|e| !e.is_empty()) {
            return Err(Error::CommandFailed {
                command: "docker info".to_string(),
                code: Some(0),
                output: errors.join("\n"),
            });
        }

        let socket_path = docker_socket_path(&self.host);
        let backend = classify_docker_backend(&docker_info, &socket_path, &self.host);
        debug!(backend = %backend, socket = %socket_path, "Classified Docker backend");

        Ok(RuntimeInfo {
            runtime: RuntimeKind::Docker,
            backend,
            version: docker_info.server_version.unwrap_or_default(),
            socket_path,
            os: self.host.os.clone(),
            available: true,
            error: String::new(),
        })
    }

    async fn detect_podman(&self) -> Result<RuntimeInfo> {
        let args = vec!["info".to_string(), "--format".to_string(), "json".to_string()];
        let output = self
            .runner
            .run("podman", &args)
            .await?
            .into_result("podman info")?;

        let podman_info: PodmanInfo = serde_json::from_str(output.trim())
            .map_err(|e| Error::parse(format!("podman info output: {}", e)))?;

        let version = podman_info
            .version
            .and_then(|v| v.version)
            .or_else(|| podman_info.host.version.and_then(|v| v.version))
            .unwrap_or_default();
        let socket_path = podman_info
            .host
            .remote_socket
            .and_then(|s| s.path)
            .unwrap_or_default();
        let backend = classify_podman_backend(&self.host);
        debug!(backend = %backend, socket = %socket_path, "Classified Podman backend");

        Ok(RuntimeInfo {
            runtime: RuntimeKind::Podman,
            backend,
            version,
            socket_path,
            os: self.host.os.clone(),
            available: true,
            error: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::FakeRunner;
    use tempfile::TempDir;

    const DOCKER_DESKTOP_INFO: &str = r#"{"ServerVersion":"27.3.1","OperatingSystem":"Docker Desktop","OSType":"linux","Architecture":"aarch64","Name":"docker-desktop"}"#;
    const NATIVE_LINUX_INFO: &str = r#"{"ServerVersion":"26.1.4","OperatingSystem":"Ubuntu 24.04.1 LTS","OSType":"linux","Architecture":"x86_64","Name":"buildhost","SecurityOptions":["name=apparmor","name=seccomp,profile=builtin","name=cgroupns"]}"#;
    const PODMAN_INFO: &str = r#"{"host":{"arch":"arm64","os":"linux","remoteSocket":{"path":"/run/user/501/podman/podman.sock","exists":true}},"version":{"Version":"5.2.3"}}"#;

    /// Host with no socket files and a controllable kernel signature
    fn host(os: &str, kernel: Option<&str>) -> (TempDir, HostEnv) {
        let dir = tempfile::tempdir().unwrap();
        let mut env = HostEnv::for_os(OsInfo::for_platform(os, "x86_64"));
        env.home = Some(dir.path().join("home"));
        env.kernel_version_path = dir.path().join("version");
        if let Some(kernel) = kernel {
            std::fs::write(&env.kernel_version_path, kernel).unwrap();
        }
        (dir, env)
    }

    fn docker_info(os: &str, name: &str) -> DockerInfo {
        DockerInfo {
            server_version: Some("27.0.0".to_string()),
            operating_system: Some(os.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_engine_rules_in_priority_order() {
        let (_dir, mac) = host("macos", None);
        let cases = [
            ("Docker Desktop", "docker-desktop", Backend::DockerDesktop),
            ("OrbStack", "orbstack", Backend::OrbStack),
            ("Ubuntu 24.04 LTS", "colima", Backend::Colima),
            ("Ubuntu 24.04 LTS", "colima-dev", Backend::Colima),
            ("Rancher Desktop WSL Distribution", "rancher-desktop", Backend::RancherDesktop),
            ("Ubuntu 24.04 LTS", "lima-default", Backend::Lima),
        ];

        for (os, name, expected) in cases {
            let backend = classify_docker_backend(&docker_info(os, name), DEFAULT_DOCKER_SOCKET, &mac);
            assert_eq!(backend, expected, "os={} name={}", os, name);
        }
    }

    #[test]
    fn test_rootless_security_option() {
        let (_dir, linux) = host("linux", Some("Linux version 6.8.0-45-generic"));
        let mut info = docker_info("Fedora Linux 40", "workstation");
        info.security_options = Some(vec!["name=seccomp,profile=builtin".into(), "name=rootless".into()]);

        assert_eq!(
            classify_docker_backend(&info, "/run/user/1000/docker.sock", &linux),
            Backend::Rootless
        );
    }

    #[test]
    fn test_socket_fragment_fallback() {
        let (_dir, mac) = host("macos", None);
        let info = docker_info("Ubuntu 22.04", "vm");

        assert_eq!(
            classify_docker_backend(&info, "/Users/dev/.colima/default/docker.sock", &mac),
            Backend::Colima
        );
        assert_eq!(
            classify_docker_backend(&info, "/Users/dev/.lima/default/sock/docker.sock", &mac),
            Backend::Lima
        );
        assert_eq!(
            classify_docker_backend(&info, "/Users/dev/.rd/docker.sock", &mac),
            Backend::RancherDesktop
        );
        assert_eq!(
            classify_docker_backend(&info, "/Users/dev/.orbstack/run/docker.sock", &mac),
            Backend::OrbStack
        );
        // No hint at all on macOS defaults to Docker Desktop
        assert_eq!(
            classify_docker_backend(&info, DEFAULT_DOCKER_SOCKET, &mac),
            Backend::DockerDesktop
        );
    }

    #[test]
    fn test_linux_native_and_wsl() {
        let (_dir, native) = host("linux", Some("Linux version 6.8.0-45-generic"));
        let info = docker_info("Ubuntu 24.04.1 LTS", "buildhost");
        assert_eq!(classify_docker_backend(&info, DEFAULT_DOCKER_SOCKET, &native), Backend::Native);

        let (_dir, wsl) = host("linux", Some("Linux version 5.15.153.1-microsoft-standard-WSL2"));
        assert_eq!(classify_docker_backend(&info, DEFAULT_DOCKER_SOCKET, &wsl), Backend::Wsl);
    }

    #[test]
    fn test_podman_backend() {
        let (_dir, mac) = host("macos", None);
        assert_eq!(classify_podman_backend(&mac), Backend::PodmanMachine);

        let (_dir, windows) = host("windows", None);
        assert_eq!(classify_podman_backend(&windows), Backend::PodmanMachine);

        let (_dir, linux) = host("linux", Some("Linux version 6.10.6-200.fc40.x86_64"));
        assert_eq!(classify_podman_backend(&linux), Backend::Native);

        let (_dir, wsl) = host("linux", Some("Linux version 5.15.0 microsoft"));
        assert_eq!(classify_podman_backend(&wsl), Backend::Wsl);

        let (_dir, bsd) = host("freebsd", None);
        assert_eq!(classify_podman_backend(&bsd), Backend::Unknown);
    }

    #[test]
    fn test_docker_socket_path() {
        let (dir, mut linux) = host("linux", None);

        linux.docker_host = Some("unix:///custom/docker.sock".to_string());
        assert_eq!(docker_socket_path(&linux), "/custom/docker.sock");

        linux.docker_host = Some("tcp://10.0.0.5:2376".to_string());
        assert_eq!(docker_socket_path(&linux), "tcp://10.0.0.5:2376");

        linux.docker_host = None;
        let xdg = dir.path().join("run");
        std::fs::create_dir_all(&xdg).unwrap();
        std::fs::write(xdg.join("docker.sock"), "").unwrap();
        linux.xdg_runtime_dir = Some(xdg.clone());
        assert_eq!(
            docker_socket_path(&linux),
            xdg.join("docker.sock").to_string_lossy()
        );

        let (_dir, windows) = host("windows", None);
        assert_eq!(docker_socket_path(&windows), WINDOWS_DOCKER_PIPE);
    }

    #[test]
    fn test_macos_socket_candidates() {
        let (_dir, mac) = host("macos", None);
        let colima = mac.home_path(".colima/default/docker.sock");
        std::fs::create_dir_all(colima.parent().unwrap()).unwrap();
        std::fs::write(&colima, "").unwrap();

        assert_eq!(docker_socket_path(&mac), colima.to_string_lossy());
    }

    #[tokio::test]
    async fn test_detect_docker_desktop() {
        let (_dir, mac) = host("macos", None);
        let runner = FakeRunner::new()
            .with_programs(&["docker"])
            .respond("docker", &["info"], DOCKER_DESKTOP_INFO);

        let info = Detector::with_host(Arc::new(runner), mac).detect().await;
        assert_eq!(info.runtime, RuntimeKind::Docker);
        assert_eq!(info.backend, Backend::DockerDesktop);
        assert_eq!(info.version, "27.3.1");
        assert!(info.available);
        assert!(info.error.is_empty());
    }

    #[tokio::test]
    async fn test_detect_native_linux() {
        let (_dir, linux) = host("linux", Some("Linux version 6.8.0-45-generic"));
        let runner = FakeRunner::new()
            .with_programs(&["docker"])
            .respond("docker", &["info"], NATIVE_LINUX_INFO);

        let info = Detector::with_host(Arc::new(runner), linux).detect().await;
        assert_eq!(info.backend, Backend::Native);
        assert_eq!(info.version, "26.1.4");
    }

    #[tokio::test]
    async fn test_detect_wsl_linux() {
        let (_dir, wsl) = host("linux", Some("Linux version 5.15.153.1-microsoft-standard-WSL2"));
        let runner = FakeRunner::new()
            .with_programs(&["docker"])
            .respond("docker", &["info"], NATIVE_LINUX_INFO);

        let info = Detector::with_host(Arc::new(runner), wsl).detect().await;
        assert_eq!(info.backend, Backend::Wsl);
    }

    #[tokio::test]
    async fn test_falls_back_to_podman_when_docker_fails() {
        let (_dir, mac) = host("macos", None);
        let runner = Arc::new(
            FakeRunner::new()
                .with_programs(&["docker", "podman"])
                .fail("docker", &["info"], "Cannot connect to the Docker daemon")
                .respond("podman", &["info"], PODMAN_INFO),
        );

        let info = Detector::with_host(runner.clone(), mac).detect().await;
        assert_eq!(info.runtime, RuntimeKind::Podman);
        assert_eq!(info.backend, Backend::PodmanMachine);
        assert_eq!(info.version, "5.2.3");
        assert_eq!(info.socket_path, "/run/user/501/podman/podman.sock");

        // One docker attempt, one podman attempt, no retries
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_podman_version_falls_back_to_host_section() {
        let (_dir, linux) = host("linux", None);
        let runner = FakeRunner::new().with_programs(&["podman"]).respond(
            "podman",
            &["info"],
            r#"{"host":{"version":{"Version":"4.9.3"}}}"#,
        );

        let info = Detector::with_host(Arc::new(runner), linux).detect().await;
        assert_eq!(info.version, "4.9.3");
        assert_eq!(info.backend, Backend::Native);
    }

    #[tokio::test]
    async fn test_docker_server_errors_fall_through() {
        let (_dir, linux) = host("linux", None);
        let runner = FakeRunner::new().with_programs(&["docker"]).respond(
            "docker",
            &["info"],
            r#"{"ServerErrors":["Cannot connect to the Docker daemon at unix:///var/run/docker.sock"]}"#,
        );

        let info = Detector::with_host(Arc::new(runner), linux).detect().await;
        assert!(!info.available);
    }

    #[tokio::test]
    async fn test_unavailable_when_nothing_installed() {
        let (_dir, linux) = host("linux", None);
        let runner = Arc::new(FakeRunner::new());

        let info = Detector::with_host(runner.clone(), linux).detect().await;
        assert_eq!(info.runtime, RuntimeKind::Unknown);
        assert_eq!(info.backend, Backend::Unknown);
        assert!(!info.available);
        assert_eq!(info.error, NO_RUNTIME_MESSAGE);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_info_fails_detection() {
        let (_dir, linux) = host("linux", None);
        let runner = FakeRunner::new()
            .with_programs(&["docker"])
            .respond("docker", &["info"], "not json");

        let info = Detector::with_host(Arc::new(runner), linux).detect().await;
        assert!(!info.available);
    }

    #[test]
    fn test_runtime_info_serialization() {
        let info = RuntimeInfo::unavailable(OsInfo::for_platform("linux", "x86_64"));
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["runtime"], "unknown");
        assert_eq!(json["backend"], "unknown");
        assert_eq!(json["available"], false);
        assert!(json.get("socket_path").is_none());

        assert_eq!(serde_json::to_value(Backend::OrbStack).unwrap(), "orbstack");
        assert_eq!(serde_json::to_value(Backend::PodmanMachine).unwrap(), "podman-machine");
        assert_eq!(Backend::RancherDesktop.to_string(), "rancher-desktop");
    }
}
