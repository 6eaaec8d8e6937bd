//! Host operating system detection

use serde::{Deserialize, Serialize};

/// Information about the host operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub os: String,
    pub arch: String,
    pub platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform_note: String,
}

impl OsInfo {
    /// Describe the platform this process runs on
    pub fn detect() -> Self {
        Self::for_platform(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Describe an arbitrary `os`/`arch` pair
    pub fn for_platform(os: &str, arch: &str) -> Self {
        let (platform, note) = match os {
            "macos" | "darwin" => (
                "macOS".to_string(),
                "Containers run in a VM. Docker Desktop, Colima, OrbStack, Podman Machine, or Lima required."
                    .to_string(),
            ),
            "linux" => (
                "Linux".to_string(),
                "Native container support. Docker or Podman can run directly. WSL2 environment possible."
                    .to_string(),
            ),
            "windows" => (
                "Windows".to_string(),
                "Containers typically run in WSL2 or Hyper-V via Docker Desktop or Podman Machine."
                    .to_string(),
            ),
            other => (other.to_string(), format!("Unsupported platform: {}", other)),
        };

        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            platform,
            platform_note: note,
        }
    }

    pub fn is_linux(&self) -> bool {
        self.os == "linux"
    }

    pub fn is_macos(&self) -> bool {
        matches!(self.os.as_str(), "macos" | "darwin")
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_matches_build_target() {
        let info = OsInfo::detect();
        assert_eq!(info.os, std::env::consts::OS);
        assert_eq!(info.arch, std::env::consts::ARCH);
        assert!(!info.platform.is_empty());
        assert!(!info.platform_note.is_empty());
    }

    #[test]
    fn test_known_platforms() {
        let mac = OsInfo::for_platform("macos", "aarch64");
        assert_eq!(mac.platform, "macOS");
        assert!(mac.is_macos());
        assert!(mac.platform_note.contains("VM"));

        let linux = OsInfo::for_platform("linux", "x86_64");
        assert_eq!(linux.platform, "Linux");
        assert!(linux.is_linux());

        let windows = OsInfo::for_platform("windows", "x86_64");
        assert_eq!(windows.platform, "Windows");
        assert!(windows.platform_note.contains("WSL2"));
    }

    #[test]
    fn test_unsupported_platform_passes_through() {
        let info = OsInfo::for_platform("freebsd", "x86_64");
        assert_eq!(info.platform, "freebsd");
        assert_eq!(info.platform_note, "Unsupported platform: freebsd");
        assert!(!info.is_linux() && !info.is_macos() && !info.is_windows());
    }
}
