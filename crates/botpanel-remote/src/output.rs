//! Command results.

use crate::error::{RemoteError, Result};

/// Exit code reported when the remote side closed without an exit status.
pub const NO_EXIT_STATUS: i32 = -1;

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Remote exit code.
    pub exit_code: i32,
    /// Collected stdout.
    pub stdout: String,
    /// Collected stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Creates a successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Creates a failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts a non-zero exit into [`RemoteError::CommandFailed`].
    ///
    /// The error message is the trimmed stderr when non-empty, otherwise the
    /// result of `fallback`.
    pub fn checked(self, fallback: impl FnOnce() -> String) -> Result<String> {
        if self.success() {
            return Ok(self.stdout);
        }
        let stderr = self.stderr.trim();
        let message = if stderr.is_empty() {
            fallback()
        } else {
            stderr.to_string()
        };
        Err(RemoteError::CommandFailed {
            exit_code: self.exit_code,
            message,
        })
    }
}

/// A chunk of streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    /// Bytes from stdout, lossily decoded.
    Stdout(String),
    /// Bytes from stderr, lossily decoded.
    Stderr(String),
}
