//! Host and container runtime detection
//!
//! This module answers two questions for every tool call:
//! which operating system the manager runs on, and which container
//! runtime (Docker or Podman) plus backend (Docker Desktop, Colima,
//! WSL, native, ...) the `kind` CLI will drive.

mod detect;
mod host;
mod os;

pub use detect::{docker_socket_path, Backend, Detector, RuntimeInfo, RuntimeKind};
pub use host::HostEnv;
pub use os::OsInfo;
