//! Remote shell traits.
//!
//! A [`Connector`] opens one [`RemoteShell`] per operation. Callers close the
//! shell when the operation ends; implementations also release the
//! connection on drop, so an early return or panic never leaks it.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::output::{CommandOutput, OutputChunk};

/// An open session to the remote host.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Runs `command` to completion and collects its output.
    ///
    /// A non-zero exit is not an error at this layer.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Runs `command`, forwarding output chunks to `sink` as they arrive.
    ///
    /// Returns the exit code, or `None` if the sink closed first.
    async fn exec_streaming(
        &self,
        command: &str,
        sink: mpsc::Sender<OutputChunk>,
    ) -> Result<Option<i32>>;

    /// Closes the session.
    async fn close(&self);
}

/// Opens sessions to a fixed remote host.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the host is unreachable or rejects the
    /// credentials.
    async fn connect(&self) -> Result<Box<dyn RemoteShell>>;

    /// Human-readable target, for logs.
    fn target(&self) -> String;
}
