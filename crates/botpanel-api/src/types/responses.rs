//! Response DTOs for the API.

use botpanel_core::BotProcess;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Connected dashboard observers.
    pub observers: usize,
}

/// Process table response.
#[derive(Debug, Clone, Serialize)]
pub struct BotListResponse {
    /// Processes known to the process manager.
    pub bots: Vec<BotProcess>,
    /// Total count.
    pub total: usize,
}

/// Generic success response.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    /// Success message.
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Success of a multi-step operation, with its transcript.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResponse {
    /// Success message.
    pub message: String,
    /// Commands run and their output.
    pub output: String,
}

/// `.env` content response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvResponse {
    /// Bot name.
    pub name: String,
    /// File content, empty when absent.
    pub env_content: String,
}

/// Log output response.
#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    /// Bot name.
    pub name: String,
    /// Log text.
    pub logs: String,
}
