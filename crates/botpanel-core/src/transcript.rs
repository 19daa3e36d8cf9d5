//! Step-by-step record of multi-step remote operations.

use botpanel_remote::command::redact;
use botpanel_remote::{CommandOutput, RemoteShell};
use tracing::debug;

use crate::error::{PanelError, Result};

/// Accumulates each step's command and output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    text: String,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command and what it printed.
    pub fn record(&mut self, command: &str, output: &CommandOutput) {
        self.text.push_str("> ");
        self.text.push_str(&redact(command));
        self.text.push('\n');
        for stream in [&output.stdout, &output.stderr] {
            let trimmed = stream.trim_end();
            if !trimmed.is_empty() {
                self.text.push_str(trimmed);
                self.text.push('\n');
            }
        }
    }

    /// Appends a free-form line.
    pub fn note(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    /// The transcript so far.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consumes the transcript.
    pub fn into_string(self) -> String {
        self.text
    }

    /// Runs one step, recording it. A non-zero exit aborts with
    /// [`PanelError::StepFailed`] carrying everything recorded so far.
    pub async fn step(&mut self, shell: &dyn RemoteShell, command: &str) -> Result<String> {
        debug!(command = %redact(command), "running step");
        let output = shell.exec(command).await?;
        self.record(command, &output);
        if output.success() {
            return Ok(output.stdout);
        }
        let stderr = match output.stderr.trim() {
            "" => format!("exit code {}", output.exit_code),
            s => s.to_string(),
        };
        Err(PanelError::StepFailed {
            command: redact(command),
            stderr,
            transcript: self.text.clone(),
        })
    }
}
