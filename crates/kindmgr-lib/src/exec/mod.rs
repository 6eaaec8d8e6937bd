//! External command execution
//!
//! Every interaction with `kind`, `docker` and `podman` goes through the
//! [`CommandRunner`] trait so that detection and lifecycle logic can be
//! exercised against a deterministic fake in tests.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[cfg(test)]
pub(crate) mod testing;

/// Captured result of a finished external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

impl CommandOutput {
    pub fn new(code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            code,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`Error::CommandFailed`] carrying the full output
    pub fn into_result(self, command: impl Into<String>) -> Result<String> {
        if self.success() {
            Ok(self.output)
        } else {
            Err(Error::CommandFailed {
                command: command.into(),
                code: self.code,
                output: self.output,
            })
        }
    }
}

/// Abstraction over process execution and executable lookup
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its combined output.
    ///
    /// A non-zero exit is not an error at this level; only failing to start
    /// the process (or exceeding a time budget) is.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Locate `program` on the search path
    fn look_path(&self, program: &str) -> Option<PathBuf>;
}

/// Render a program and its arguments for logs and error messages
pub fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// [`CommandRunner`] backed by `tokio::process`
///
/// Children are spawned with `kill_on_drop`, so abandoning a call (timeout,
/// client cancellation) also terminates the external process.
#[derive(Debug, Clone, Default)]
pub struct ExecCommandRunner {
    timeout: Option<Duration>,
}

impl ExecCommandRunner {
    /// Create a runner without a time budget
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Create a runner that kills commands running longer than `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[async_trait]
impl CommandRunner for ExecCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(command = %display_command(program, args), "Running external command");

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = match self.timeout {
            Some(after) => tokio::time::timeout(after, command.output())
                .await
                .map_err(|_| Error::Timeout {
                    command: display_command(program, args),
                    after,
                })?,
            None => command.output().await,
        }
        .map_err(|source| Error::Spawn {
            program: program.to_string(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput::new(output.status.code(), combined))
    }

    fn look_path(&self, program: &str) -> Option<PathBuf> {
        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var).find_map(|dir| executable_in(&dir, program))
    }
}

fn executable_in(dir: &Path, program: &str) -> Option<PathBuf> {
    let candidate = dir.join(program);
    if is_executable(&candidate) {
        return Some(candidate);
    }

    if cfg!(windows) {
        let with_ext = dir.join(format!("{}.exe", program));
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }

    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result_keeps_output_on_failure() {
        let out = CommandOutput::new(Some(2), "boom\n");
        match out.into_result("kind get clusters") {
            Err(Error::CommandFailed {
                command,
                code,
                output,
            }) => {
                assert_eq!(command, "kind get clusters");
                assert_eq!(code, Some(2));
                assert_eq!(output, "boom\n");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_signal_termination_is_not_success() {
        assert!(!CommandOutput::new(None, "").success());
        assert!(CommandOutput::new(Some(0), "").success());
    }

    #[test]
    fn test_display_command_joins_args() {
        let args = vec!["get".to_string(), "clusters".to_string()];
        assert_eq!(display_command("kind", &args), "kind get clusters");
        assert_eq!(display_command("kind", &[]), "kind");
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_lookup_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("kind");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(executable_in(dir.path(), "kind").is_none());

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(executable_in(dir.path(), "kind"), Some(tool));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_runner_captures_output_and_exit_code() {
        let runner = ExecCommandRunner::new();
        let args = vec!["-c".to_string(), "echo out; echo err 1>&2; exit 3".to_string()];

        let out = runner.run("sh", &args).await.unwrap();
        assert_eq!(out.code, Some(3));
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_runner_enforces_timeout() {
        let runner = ExecCommandRunner::with_timeout(Duration::from_millis(100));
        let args = vec!["5".to_string()];

        let err = runner.run("sleep", &args).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_exec_runner_reports_missing_program() {
        let runner = ExecCommandRunner::new();
        let err = runner
            .run("definitely-not-a-real-binary-kindmgr", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
