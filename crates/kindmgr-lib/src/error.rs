//! Error types for kind cluster management

use std::time::Duration;
use thiserror::Error;

/// Main error type for kind manager operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A required parameter is missing, empty, or malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A cluster configuration document was rejected before use
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A document could not be parsed at all
    #[error("parse error: {0}")]
    Parse(String),

    /// A document parsed but violates a structural rule
    #[error("schema error: {0}")]
    Schema(String),

    /// The requested cluster, node set, or file does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// An external command exited unsuccessfully
    #[error("{command} failed (exit code {}):\n{output}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// Cluster nodes could not be enumerated
    #[error("lookup failed for cluster {cluster:?}: {source}")]
    Lookup {
        cluster: String,
        #[source]
        source: Box<Error>,
    },

    /// An external program could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command exceeded its time budget and was killed
    #[error("{command} timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an invalid input error with the given message
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invalid config error with the given message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a parse error with the given message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a schema error with the given message
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a not found error with the given message
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Wrap a failure that prevented listing the nodes of `cluster`
    pub fn lookup(cluster: impl Into<String>, source: Error) -> Self {
        Self::Lookup {
            cluster: cluster.into(),
            source: Box::new(source),
        }
    }
}

/// Result type for kind manager operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
