//! Notification channel handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use botpanel_core::telegram::send_test;
use botpanel_core::{NotificationChannel, NotificationSettings};

use crate::error::Result;
use crate::state::AppState;
use crate::types::{SuccessResponse, TestNotificationRequest};

/// POST /api/bots/notifications/test - Send one message with the given
/// credentials, independent of any bot.
pub async fn send_test_notification(
    State(state): State<AppState>,
    Json(req): Json<TestNotificationRequest>,
) -> Result<Json<SuccessResponse>> {
    send_test(
        state.sender.as_ref(),
        &req.token,
        &req.chat_id,
        req.message.as_deref(),
    )
    .await?;
    Ok(Json(SuccessResponse::new("test message sent")))
}

/// GET /api/bots/notifications/:name - Channels and injection state.
pub async fn get_notifications(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NotificationSettings>> {
    Ok(Json(state.controller.read_settings(&name).await?))
}

/// POST /api/bots/notifications/:name - Add or replace a channel.
pub async fn save_notification(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(channel): Json<NotificationChannel>,
) -> Result<Json<SuccessResponse>> {
    let message = state.controller.save_channel(&name, &channel).await?;
    state.refresh_observers();
    Ok(Json(SuccessResponse::new(message)))
}

/// DELETE /api/bots/notifications/:name/:id - Remove a channel.
pub async fn delete_notification(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, u32)>,
) -> Result<Json<SuccessResponse>> {
    let message = state.controller.remove_channel(&name, id).await?;
    state.refresh_observers();
    Ok(Json(SuccessResponse::new(message)))
}

/// POST /api/bots/inject-notifier/:name - Write the notifier module, patch
/// the main script and reload.
pub async fn inject_notifier(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let message = state.controller.inject_notifier(&name).await?;
    state.refresh_observers();
    Ok(Json(SuccessResponse::new(message)))
}
