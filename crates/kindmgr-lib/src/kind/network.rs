//! Network exposure advice per runtime backend

use super::config::PortMapping;
use crate::runtime::{Backend, RuntimeInfo};
use serde::{Deserialize, Serialize};

pub const LOOPBACK_ADDRESS: &str = "127.0.0.1";
pub const WILDCARD_ADDRESS: &str = "0.0.0.0";
pub const NODE_PORT_RANGE: &str = "30000-32767";

/// How applications inside a kind cluster can be reached from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAdvice {
    pub listen_address: String,
    pub supports_port_mapping: bool,
    pub requires_extra_config: bool,
    pub notes: String,
    pub recommended_port_range: String,
}

/// Map a detected runtime to network exposure advice
pub fn advise(info: &RuntimeInfo) -> NetworkAdvice {
    let mut advice = NetworkAdvice {
        listen_address: LOOPBACK_ADDRESS.to_string(),
        supports_port_mapping: true,
        requires_extra_config: false,
        notes: String::new(),
        recommended_port_range: NODE_PORT_RANGE.to_string(),
    };

    advice.notes = match info.backend {
        Backend::DockerDesktop => {
            "Docker Desktop forwards container ports to the host automatically. \
             Use extraPortMappings in the kind config to map NodePorts to host ports. \
             Bind to 127.0.0.1 for local-only access or 0.0.0.0 for LAN access."
        }
        Backend::Colima => {
            "Colima forwards ports from its VM to the host. extraPortMappings work without changes. \
             Bind to 127.0.0.1 for local access; LAN access needs 0.0.0.0 and a Colima network \
             setup that allows it."
        }
        Backend::Wsl => {
            "WSL2 forwards localhost ports from the Linux VM to Windows. \
             extraPortMappings on 127.0.0.1 are reachable from the Windows host. \
             LAN access may need Windows firewall rules."
        }
        Backend::PodmanMachine => {
            // The machine VM only exists off Linux
            advice.requires_extra_config = info.os.is_macos() || info.os.is_windows();
            "Podman Machine forwards ports from its VM to the host. \
             extraPortMappings work with a rootful machine; rootless mode may need \
             additional port forwarding."
        }
        Backend::Native if info.os.is_linux() => {
            advice.listen_address = WILDCARD_ADDRESS.to_string();
            "Native Linux: containers are directly reachable. extraPortMappings bind to the \
             host network interface and container IPs are routable from the host."
        }
        Backend::Native => "Native engine on a non-Linux host. extraPortMappings with 127.0.0.1 is a safe default.",
        Backend::RancherDesktop => {
            "Rancher Desktop forwards container ports like Docker Desktop. \
             extraPortMappings work as expected."
        }
        Backend::Lima => {
            "Lima VMs forward ports to the host. extraPortMappings should work; \
             check the Lima port forwarding settings if they do not."
        }
        Backend::OrbStack => {
            "OrbStack forwards container ports to the host automatically. \
             extraPortMappings on 127.0.0.1 work out of the box."
        }
        Backend::Rootless => {
            advice.requires_extra_config = true;
            "Rootless engine: host ports below 1024 cannot be bound unless \
             net.ipv4.ip_unprivileged_port_start is lowered. Prefer high host ports \
             or adjust the sysctl."
        }
        Backend::Unknown => "Unknown backend. extraPortMappings with 127.0.0.1 is a safe default.",
    }
    .to_string();

    advice
}

/// HTTP and HTTPS ingress mappings bound on `listen_address` (loopback when empty)
pub fn default_port_mappings(listen_address: &str) -> Vec<PortMapping> {
    let address = if listen_address.is_empty() {
        LOOPBACK_ADDRESS
    } else {
        listen_address
    };

    [80, 443]
        .into_iter()
        .map(|port| PortMapping {
            host_port: port,
            container_port: port,
            listen_address: address.to_string(),
            protocol: "TCP".to_string(),
        })
        .collect()
}

/// Render advice as labelled lines for humans
pub fn format_network_advice(advice: &NetworkAdvice) -> String {
    let mut out = format!(
        "Listen Address: {}\nPort Mapping Supported: {}\n",
        advice.listen_address, advice.supports_port_mapping
    );
    if advice.requires_extra_config {
        out.push_str("Warning: Extra configuration may be required for port forwarding.\n");
    }
    out.push_str(&format!(
        "Recommended NodePort Range: {}\nNotes: {}",
        advice.recommended_port_range, advice.notes
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{OsInfo, RuntimeKind};

    fn info(backend: Backend, os: &str) -> RuntimeInfo {
        let mut info = RuntimeInfo::for_runtime(RuntimeKind::Docker, OsInfo::for_platform(os, "x86_64"));
        info.backend = backend;
        info
    }

    #[test]
    fn test_native_linux_uses_wildcard() {
        let advice = advise(&info(Backend::Native, "linux"));
        assert_eq!(advice.listen_address, WILDCARD_ADDRESS);
        assert!(advice.supports_port_mapping);
        assert!(!advice.requires_extra_config);
    }

    #[test]
    fn test_native_off_linux_stays_on_loopback() {
        let advice = advise(&info(Backend::Native, "macos"));
        assert_eq!(advice.listen_address, LOOPBACK_ADDRESS);
    }

    #[test]
    fn test_podman_machine_extra_config_off_linux() {
        assert!(advise(&info(Backend::PodmanMachine, "macos")).requires_extra_config);
        assert!(advise(&info(Backend::PodmanMachine, "windows")).requires_extra_config);
        assert!(!advise(&info(Backend::PodmanMachine, "linux")).requires_extra_config);
    }

    #[test]
    fn test_every_backend_has_advice() {
        let backends = [
            Backend::DockerDesktop,
            Backend::Colima,
            Backend::Wsl,
            Backend::PodmanMachine,
            Backend::Native,
            Backend::RancherDesktop,
            Backend::Lima,
            Backend::OrbStack,
            Backend::Rootless,
            Backend::Unknown,
        ];

        for backend in backends {
            let advice = advise(&info(backend, "linux"));
            assert!(!advice.notes.is_empty(), "{} has no notes", backend);
            assert_eq!(advice.recommended_port_range, NODE_PORT_RANGE);
            assert!(advice.supports_port_mapping);
        }
    }

    #[test]
    fn test_rootless_requires_extra_config() {
        let advice = advise(&info(Backend::Rootless, "linux"));
        assert!(advice.requires_extra_config);
        assert_eq!(advice.listen_address, LOOPBACK_ADDRESS);
        assert!(advice.notes.contains("ip_unprivileged_port_start"));
    }

    #[test]
    fn test_unknown_backend_defaults_to_loopback() {
        let advice = advise(&RuntimeInfo::unavailable(OsInfo::for_platform("linux", "x86_64")));
        assert_eq!(advice.listen_address, LOOPBACK_ADDRESS);
        assert!(advice.notes.starts_with("Unknown backend"));
    }

    #[test]
    fn test_default_port_mappings() {
        let mappings = default_port_mappings("");
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].host_port, 80);
        assert_eq!(mappings[1].container_port, 443);
        assert!(mappings.iter().all(|m| m.listen_address == LOOPBACK_ADDRESS));
        assert!(mappings.iter().all(|m| m.protocol == "TCP"));

        let mappings = default_port_mappings(WILDCARD_ADDRESS);
        assert!(mappings.iter().all(|m| m.listen_address == WILDCARD_ADDRESS));
    }

    #[test]
    fn test_format_network_advice() {
        let text = format_network_advice(&advise(&info(Backend::PodmanMachine, "macos")));
        assert!(text.starts_with("Listen Address: 127.0.0.1\n"));
        assert!(text.contains("Port Mapping Supported: true"));
        assert!(text.contains("Warning: Extra configuration"));
        assert!(text.contains("Recommended NodePort Range: 30000-32767"));
        assert!(text.contains("Notes: Podman Machine"));

        let text = format_network_advice(&advise(&info(Backend::Native, "linux")));
        assert!(!text.contains("Warning"));
    }
}
