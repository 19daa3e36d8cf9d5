//! Domain error types.

use botpanel_remote::RemoteError;
use thiserror::Error;

/// Errors produced by panel operations.
#[derive(Debug, Error)]
pub enum PanelError {
    /// The remote session could not be established or broke mid-command.
    #[error("remote transport error: {0}")]
    Transport(RemoteError),

    /// Bot name not present in the process table (or missing its working directory).
    #[error("bot '{0}' not found in the process manager")]
    NotFound(String),

    /// The bot manifest could not be read or parsed.
    #[error("cannot read manifest {path}: {reason}")]
    ManifestUnreadable {
        /// Manifest path on the remote host.
        path: String,
        /// Why it was unreadable.
        reason: String,
    },

    /// The manifest declares neither `main` nor `scripts.start`.
    #[error("manifest {0} declares neither \"main\" nor \"scripts.start\"")]
    NoEntryPoint(String),

    /// A remote command exited non-zero.
    #[error("{message}")]
    CommandFailed {
        /// Remote exit code.
        exit_code: i32,
        /// Remote stderr, or a generic description naming the operation.
        message: String,
    },

    /// A bounded poll ran out of time.
    #[error("{0}")]
    ConfirmationTimeout(String),

    /// Part of the operation took effect before a later step failed.
    #[error("{saved}, but {failure}")]
    PartialSuccess {
        /// What was persisted.
        saved: String,
        /// The step that failed afterwards.
        failure: String,
    },

    /// A step of a multi-step operation failed.
    #[error("step `{command}` failed: {stderr}")]
    StepFailed {
        /// The failing command.
        command: String,
        /// Its stderr.
        stderr: String,
        /// Everything recorded up to and including the failure.
        transcript: String,
    },

    /// Caller-supplied input was rejected before touching the remote host.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The target directory for a new bot already exists.
    #[error("directory already exists and is not empty: {0}")]
    DirectoryExists(String),

    /// Notification provider refused or could not be reached.
    #[error("{0}")]
    Delivery(String),
}

impl PanelError {
    /// Returns the transcript carried by the error, if any.
    pub fn transcript(&self) -> Option<&str> {
        match self {
            PanelError::StepFailed { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    /// Returns true if the error leaves the remote state half-applied.
    pub fn is_partial(&self) -> bool {
        matches!(self, PanelError::PartialSuccess { .. })
    }
}

impl From<RemoteError> for PanelError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::CommandFailed { exit_code, message } => {
                PanelError::CommandFailed { exit_code, message }
            }
            other => PanelError::Transport(other),
        }
    }
}

/// Result type for panel operations.
pub type Result<T> = std::result::Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_command_failure_maps_to_command_failed() {
        let err: PanelError = RemoteError::CommandFailed {
            exit_code: 1,
            message: "[PM2][ERROR] Process bot not found".into(),
        }
        .into();
        assert!(matches!(err, PanelError::CommandFailed { exit_code: 1, .. }));
        assert_eq!(err.to_string(), "[PM2][ERROR] Process bot not found");
    }

    #[test]
    fn test_transport_failures_stay_transport() {
        let err: PanelError = RemoteError::Auth("root".into()).into();
        assert!(matches!(err, PanelError::Transport(_)));
    }

    #[test]
    fn test_partial_success_display() {
        let err = PanelError::PartialSuccess {
            saved: ".env for 'bot' saved".into(),
            failure: "reload failed: boom".into(),
        };
        assert!(err.is_partial());
        assert_eq!(err.to_string(), ".env for 'bot' saved, but reload failed: boom");
    }

    #[test]
    fn test_step_failed_carries_transcript() {
        let err = PanelError::StepFailed {
            command: "git fetch origin".into(),
            stderr: "fatal: unable to access".into(),
            transcript: "> git fetch origin\n".into(),
        };
        assert_eq!(err.transcript(), Some("> git fetch origin\n"));
        assert!(PanelError::NotFound("x".into()).transcript().is_none());
    }
}
