//! Snapshot of the process environment used by detection and credential lookup

use super::OsInfo;
use std::path::{Path, PathBuf};

/// Default location of the kernel version signature on Linux
const PROC_VERSION: &str = "/proc/version";

/// Host facts read from the environment
///
/// Captured once per tool call. Tests build one by hand to point detection
/// at temporary directories instead of the real home directory.
#[derive(Debug, Clone)]
pub struct HostEnv {
    pub os: OsInfo,
    pub home: Option<PathBuf>,
    /// `DOCKER_HOST`
    pub docker_host: Option<String>,
    /// `DOCKER_CONFIG` directory
    pub docker_config: Option<PathBuf>,
    /// `REGISTRY_AUTH_FILE`
    pub registry_auth_file: Option<PathBuf>,
    /// `XDG_RUNTIME_DIR`
    pub xdg_runtime_dir: Option<PathBuf>,
    pub kernel_version_path: PathBuf,
}

impl HostEnv {
    /// Read the current process environment
    pub fn from_process() -> Self {
        Self {
            os: OsInfo::detect(),
            home: dirs_next::home_dir(),
            docker_host: non_empty_var("DOCKER_HOST"),
            docker_config: non_empty_var("DOCKER_CONFIG").map(PathBuf::from),
            registry_auth_file: non_empty_var("REGISTRY_AUTH_FILE").map(PathBuf::from),
            xdg_runtime_dir: non_empty_var("XDG_RUNTIME_DIR").map(PathBuf::from),
            kernel_version_path: PathBuf::from(PROC_VERSION),
        }
    }

    /// An otherwise empty environment for the given OS
    pub fn for_os(os: OsInfo) -> Self {
        Self {
            os,
            home: None,
            docker_host: None,
            docker_config: None,
            registry_auth_file: None,
            xdg_runtime_dir: None,
            kernel_version_path: PathBuf::from(PROC_VERSION),
        }
    }

    /// Resolve a path relative to the home directory
    ///
    /// Falls back to the relative path itself when no home is known.
    pub fn home_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        match &self.home {
            Some(home) => home.join(relative),
            None => relative.as_ref().to_path_buf(),
        }
    }

    /// True when the kernel signature identifies a Linux VM under Windows (WSL)
    pub fn is_wsl(&self) -> bool {
        std::fs::read_to_string(&self.kernel_version_path)
            .map(|v| {
                let lower = v.to_lowercase();
                lower.contains("microsoft") || lower.contains("wsl")
            })
            .unwrap_or(false)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wsl_kernel_signature() {
        let dir = tempfile::tempdir().unwrap();
        let version = dir.path().join("version");
        let mut env = HostEnv::for_os(OsInfo::for_platform("linux", "x86_64"));
        env.kernel_version_path = version.clone();

        // Missing file is not WSL
        assert!(!env.is_wsl());

        std::fs::write(
            &version,
            "Linux version 5.15.153.1-microsoft-standard-WSL2 (root@65c757a075e2)",
        )
        .unwrap();
        assert!(env.is_wsl());

        std::fs::write(&version, "Linux version 6.8.0-45-generic (buildd@lcy02-amd64-075)").unwrap();
        assert!(!env.is_wsl());
    }

    #[test]
    fn test_home_path() {
        let mut env = HostEnv::for_os(OsInfo::for_platform("linux", "x86_64"));
        assert_eq!(env.home_path(".docker/config.json"), PathBuf::from(".docker/config.json"));

        env.home = Some(PathBuf::from("/home/dev"));
        assert_eq!(
            env.home_path(".docker/config.json"),
            PathBuf::from("/home/dev/.docker/config.json")
        );
    }
}
