//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use botpanel_core::PanelError;
use serde_json::json;
use thiserror::Error;

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error type for consistent error responses.
///
/// Messages are passed through unprefixed so remote stderr reaches the
/// operator verbatim.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bot not found.
    #[error("{0}")]
    NotFound(String),

    /// Invalid input.
    #[error("{0}")]
    BadRequest(String),

    /// Target already exists.
    #[error("{0}")]
    Conflict(String),

    /// The bot's manifest cannot be used.
    #[error("{0}")]
    Unprocessable(String),

    /// A remote command or an external service failed.
    #[error("{message}")]
    Upstream {
        /// Error message.
        message: String,
        /// Transcript of the steps run before the failure.
        output: Option<String>,
    },

    /// The change was written but not applied.
    #[error("{0}")]
    PartialSuccess(String),

    /// A confirmation poll gave up.
    #[error("{0}")]
    Timeout(String),

    /// The remote host cannot be reached.
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::PartialSuccess(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({ "error": self.to_string() });
        match self {
            ApiError::Upstream {
                output: Some(output),
                ..
            } => body["output"] = json!(output),
            ApiError::PartialSuccess(_) => body["configSaved"] = json!(true),
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}

impl From<PanelError> for ApiError {
    fn from(err: PanelError) -> Self {
        let message = err.to_string();
        match err {
            PanelError::NotFound(_) => ApiError::NotFound(message),
            PanelError::InvalidInput(_) => ApiError::BadRequest(message),
            PanelError::DirectoryExists(_) => ApiError::Conflict(message),
            PanelError::ManifestUnreadable { .. } | PanelError::NoEntryPoint(_) => {
                ApiError::Unprocessable(message)
            }
            PanelError::Transport(_) => ApiError::ServiceUnavailable(message),
            PanelError::ConfirmationTimeout(_) => ApiError::Timeout(message),
            PanelError::PartialSuccess { .. } => ApiError::PartialSuccess(message),
            PanelError::StepFailed { transcript, .. } => ApiError::Upstream {
                message,
                output: Some(transcript),
            },
            PanelError::CommandFailed { .. } | PanelError::Delivery(_) => ApiError::Upstream {
                message,
                output: None,
            },
        }
    }
}
