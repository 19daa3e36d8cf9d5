//! Bot lifecycle handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use botpanel_core::NewBot;
use tracing::info;

use crate::error::Result;
use crate::state::AppState;
use crate::types::{
    AddBotRequest, BotListResponse, EnvResponse, LogsQuery, LogsResponse, ManageBotRequest,
    SuccessResponse, TranscriptResponse, UpdateBotRequest, UpdateEnvRequest,
};

/// GET /api/bots - The live process table.
pub async fn list_bots(State(state): State<AppState>) -> Result<Json<BotListResponse>> {
    let bots = state.controller.list().await?;
    let total = bots.len();
    Ok(Json(BotListResponse { bots, total }))
}

/// POST /api/bots/add-from-git - Clone, install and start a new bot.
pub async fn add_bot(
    State(state): State<AppState>,
    Json(req): Json<AddBotRequest>,
) -> Result<(StatusCode, Json<TranscriptResponse>)> {
    let bot = NewBot {
        name: req.name.trim().to_string(),
        git_url: req.git_url,
        env_content: req.env_content,
    };
    info!(bot = %bot.name, "adding bot");
    let output = state.controller.add(&bot).await?;
    state.refresh_observers();

    Ok((
        StatusCode::CREATED,
        Json(TranscriptResponse {
            message: format!("bot '{}' added and started", bot.name),
            output,
        }),
    ))
}

/// POST /api/bots/manage - Start, stop or restart a bot.
pub async fn manage_bot(
    State(state): State<AppState>,
    Json(req): Json<ManageBotRequest>,
) -> Result<Json<SuccessResponse>> {
    let message = state.controller.manage(&req.name, req.action).await?;
    state.refresh_observers();
    Ok(Json(SuccessResponse::new(message)))
}

/// GET /api/bots/env/:name - Current `.env` content.
pub async fn get_env(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EnvResponse>> {
    let env_content = state.controller.read_env(&name).await?;
    Ok(Json(EnvResponse { name, env_content }))
}

/// POST /api/bots/env/:name - Replace `.env` and reload.
pub async fn update_env(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<UpdateEnvRequest>,
) -> Result<Json<SuccessResponse>> {
    let message = state.controller.update_env(&name, &req.env_content).await?;
    state.refresh_observers();
    Ok(Json(SuccessResponse::new(message)))
}

/// DELETE /api/bots/delete/:name - Remove a bot from the process manager.
pub async fn delete_bot(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let message = state.controller.delete(&name).await?;
    state.refresh_observers();
    Ok(Json(SuccessResponse::new(message)))
}

/// GET /api/bots/logs/:name?lines=N - Recent log output.
pub async fn get_logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>> {
    let logs = state.controller.logs(&name, query.lines).await?;
    Ok(Json(LogsResponse { name, logs }))
}

/// POST /api/bots/update/:name - Pull, reinstall and reload.
pub async fn update_bot(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<UpdateBotRequest>>,
) -> Result<Json<TranscriptResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let output = state.controller.update(&name, req.git_url.as_deref()).await?;
    state.refresh_observers();

    Ok(Json(TranscriptResponse {
        message: format!("bot '{name}' updated"),
        output,
    }))
}
