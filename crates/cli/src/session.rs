//! Process-wide handles shared by every command

use kindmgr_lib::kind::Manager;
use kindmgr_lib::{CommandRunner, Detector, ExecCommandRunner, HostEnv, RuntimeInfo};
use std::sync::Arc;
use std::time::Duration;

/// Command runner and host snapshot for one CLI invocation
pub struct Session {
    runner: Arc<dyn CommandRunner>,
    host: HostEnv,
}

impl Session {
    /// Create a session; `timeout` bounds every external command
    pub fn new(timeout: Option<Duration>) -> Self {
        let runner = match timeout {
            Some(t) => ExecCommandRunner::with_timeout(t),
            None => ExecCommandRunner::new(),
        };
        Self {
            runner: Arc::new(runner),
            host: HostEnv::from_process(),
        }
    }

    pub fn host(&self) -> &HostEnv {
        &self.host
    }

    /// Detect the container runtime
    pub async fn detect(&self) -> RuntimeInfo {
        Detector::with_host(self.runner.clone(), self.host.clone())
            .detect()
            .await
    }

    /// A cluster manager bound to the detected runtime
    pub async fn manager(&self) -> Manager {
        Manager::new(self.runner.clone(), self.detect().await)
    }
}
