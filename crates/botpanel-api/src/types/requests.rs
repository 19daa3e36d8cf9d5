//! Request DTOs for the API.

use botpanel_core::ProcessAction;
use serde::Deserialize;

/// Add bot request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBotRequest {
    /// Process and directory name.
    pub name: String,
    /// Repository to clone.
    pub git_url: String,
    /// Initial `.env` content.
    #[serde(default)]
    pub env_content: String,
}

/// Start/stop/restart request.
#[derive(Debug, Clone, Deserialize)]
pub struct ManageBotRequest {
    /// Bot name.
    pub name: String,
    /// Action to run.
    pub action: ProcessAction,
}

/// Replace `.env` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnvRequest {
    /// New file content.
    pub env_content: String,
}

/// Update-from-git request. The body is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBotRequest {
    /// Repoint `origin` before pulling.
    pub git_url: Option<String>,
}

/// Log query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsQuery {
    /// Number of lines.
    pub lines: Option<usize>,
}

/// Test notification request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNotificationRequest {
    /// Telegram bot token.
    pub token: String,
    /// Destination chat.
    pub chat_id: String,
    /// Message; a default text is sent when absent.
    pub message: Option<String>,
}

/// Messages a dashboard client sends over `/ws/dashboard`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum DashboardRequest {
    /// Wipe a bot's session directory and restart it.
    ResetSession {
        /// Bot name.
        name: String,
    },
}
