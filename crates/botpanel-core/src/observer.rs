//! Messages pushed to connected observers.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::process::BotProcess;

/// Prefix marking messages produced by the panel itself rather than the bot.
pub const PANEL_PREFIX: &str = "[panel]";

/// A push-only observer message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObserverMessage {
    /// Fresh process table.
    StatusUpdate { data: Vec<BotProcess> },
    /// Workflow progress line.
    Progress { message: String },
    /// Workflow or request failure.
    Error { message: String },
}

impl ObserverMessage {
    /// A `[panel]`-prefixed progress line.
    pub fn progress(message: impl AsRef<str>) -> Self {
        ObserverMessage::Progress {
            message: format!("{PANEL_PREFIX} {}", message.as_ref()),
        }
    }

    /// An error line.
    pub fn error(message: impl Into<String>) -> Self {
        ObserverMessage::Error {
            message: message.into(),
        }
    }
}

/// Receives workflow progress. Delivery is at-most-once: a sink whose
/// observer went away drops the message silently.
pub trait ProgressSink: Send + Sync {
    /// Delivers one message.
    fn emit(&self, message: ObserverMessage);
}

impl ProgressSink for mpsc::UnboundedSender<ObserverMessage> {
    fn emit(&self, message: ObserverMessage) {
        let _ = self.send(message);
    }
}

impl ProgressSink for mpsc::Sender<ObserverMessage> {
    fn emit(&self, message: ObserverMessage) {
        let _ = self.try_send(message);
    }
}

impl ProgressSink for broadcast::Sender<ObserverMessage> {
    fn emit(&self, message: ObserverMessage) {
        let _ = self.send(message);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl ProgressSink for Discard {
    fn emit(&self, _message: ObserverMessage) {}
}
