//! Logging infrastructure shared by the server and the CLI
//!
//! Provides:
//! - JSON logs on stderr through `tracing-subscriber` (stdout carries protocol traffic)
//! - `LOG_LEVEL` mapping with `RUST_LOG` taking precedence
//! - Structured lifecycle and tool-call events

use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a `LOG_LEVEL` value to a filter directive.
///
/// Accepts `debug`, `info`, `warn` and `error` in any case; anything else
/// yields `info`.
pub fn level_directive(raw: &str) -> &'static str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `log_level` when set.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(log_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .try_init()
}

/// Structured events for the lifecycle of a tool server
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, os: &str, arch: &str) {
        info!(
            event = "startup",
            service = %self.service,
            version = %version,
            os = %os,
            arch = %arch,
            "Starting"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(event = "shutdown", service = %self.service, reason = %reason, "Shutting down");
    }

    /// Record the outcome of one tool call
    pub fn log_tool_call(&self, tool: &str, elapsed: Duration, is_error: bool) {
        let elapsed_ms = elapsed.as_millis() as u64;
        if is_error {
            warn!(
                event = "tool_call",
                service = %self.service,
                tool = %tool,
                elapsed_ms,
                is_error,
                "Tool call returned an error"
            );
        } else {
            info!(
                event = "tool_call",
                service = %self.service,
                tool = %tool,
                elapsed_ms,
                is_error,
                "Tool call completed"
            );
        }
    }

    /// Record a call abandoned before completion
    pub fn log_tool_abandoned(&self, tool: &str, elapsed: Duration, reason: &str) {
        warn!(
            event = "tool_abandoned",
            service = %self.service,
            tool = %tool,
            elapsed_ms = elapsed.as_millis() as u64,
            reason = %reason,
            "Tool call abandoned"
        );
    }
}
