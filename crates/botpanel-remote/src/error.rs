//! Error types for remote command execution.

use thiserror::Error;

/// Errors that can occur while talking to the remote host.
///
/// Everything except [`RemoteError::CommandFailed`] is a transport failure:
/// the command never ran, or its result could not be collected.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// TCP or SSH handshake failure.
    #[error("failed to connect to {host}: {reason}")]
    Connect {
        /// Target host.
        host: String,
        /// Underlying failure.
        reason: String,
    },

    /// Connection establishment exceeded the configured bound.
    #[error("connection to {host} timed out after {secs}s")]
    Timeout {
        /// Target host.
        host: String,
        /// Timeout in seconds.
        secs: u64,
    },

    /// The server rejected the supplied credentials.
    #[error("authentication rejected for user '{0}'")]
    Auth(String),

    /// Private key could not be loaded.
    #[error("failed to load private key {path}: {reason}")]
    Key {
        /// Key file path.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// Session channel failure after connecting.
    #[error("ssh channel error: {0}")]
    Channel(String),

    /// The remote command ran and exited non-zero.
    #[error("{message}")]
    CommandFailed {
        /// Remote exit code.
        exit_code: i32,
        /// Remote stderr, or a generic description when stderr was empty.
        message: String,
    },
}

impl RemoteError {
    /// Returns true for failures where the command never completed.
    pub fn is_transport(&self) -> bool {
        !matches!(self, RemoteError::CommandFailed { .. })
    }
}

impl From<russh::Error> for RemoteError {
    fn from(e: russh::Error) -> Self {
        RemoteError::Channel(e.to_string())
    }
}

/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
