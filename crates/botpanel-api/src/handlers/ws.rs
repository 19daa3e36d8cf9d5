//! WebSocket handlers: dashboard observer channel and log follow.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
};
use botpanel_core::observer::PANEL_PREFIX;
use botpanel_core::ObserverMessage;
use botpanel_remote::OutputChunk;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::AppState;
use crate::types::{DashboardRequest, LogsQuery};

/// GET /ws/dashboard - Status updates and session reset requests.
pub async fn dashboard_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_dashboard(socket, state))
}

async fn handle_dashboard(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut updates = state.broadcaster.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ObserverMessage>();

    debug!(observers = state.broadcaster.observer_count(), "dashboard connected");

    let initial = match state.broadcaster.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => ObserverMessage::error(e.to_string()),
    };
    if send_json(&mut ws_tx, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(message) => {
                        if send_json(&mut ws_tx, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "dashboard observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            Some(reply) = reply_rx.recv() => {
                if send_json(&mut ws_tx, &reply).await.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_dashboard_text(&state, &text, &reply_tx);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(error = %e, "dashboard socket error");
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    debug!("dashboard disconnected");
}

/// Handles one text frame from a dashboard client. Workflows run detached:
/// they keep going if the client disconnects and their progress is dropped.
pub fn handle_dashboard_text(
    state: &AppState,
    text: &str,
    replies: &mpsc::UnboundedSender<ObserverMessage>,
) -> Option<JoinHandle<()>> {
    match serde_json::from_str::<DashboardRequest>(text) {
        Ok(DashboardRequest::ResetSession { name }) => {
            let state = state.clone();
            let replies = replies.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = state.controller.reset_session(&name, &replies).await {
                    debug!(bot = %name, error = %e, "session reset ended with error");
                }
                state.broadcaster.broadcast_now().await;
            }))
        }
        Err(e) => {
            let _ = replies.send(ObserverMessage::error(format!("invalid message: {e}")));
            None
        }
    }
}

async fn send_json<S>(ws_tx: &mut S, message: &ObserverMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = serde_json::to_string(message).map_err(|e| {
        warn!(error = %e, "failed to encode observer message");
    })?;
    ws_tx.send(Message::Text(json)).await.map_err(|_| ())
}

/// GET /ws/logs/:name?lines=N - Raw log follow.
pub async fn logs_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_logs(socket, state, name, query.lines))
}

async fn handle_logs(socket: WebSocket, state: AppState, name: String, lines: Option<usize>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<OutputChunk>(64);

    let controller = state.controller.clone();
    let follow_name = name.clone();
    let follow = tokio::spawn(async move { controller.follow_logs(&follow_name, lines, chunk_tx).await });

    let mut client_gone = false;
    loop {
        tokio::select! {
            chunk = chunk_rx.recv() => {
                let text = match chunk {
                    Some(OutputChunk::Stdout(text)) | Some(OutputChunk::Stderr(text)) => text,
                    None => break,
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    client_gone = true;
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        client_gone = true;
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    if client_gone {
        // Dropping the follow task drops its session.
        follow.abort();
        debug!(bot = %name, "log follower disconnected");
        return;
    }

    let reason = match follow.await {
        Ok(Ok(code)) => format!("log stream ended (exit code {})", code.unwrap_or(-1)),
        Ok(Err(e)) => e.to_string(),
        Err(e) => {
            warn!(bot = %name, error = %e, "log follow task failed");
            "log stream failed".to_string()
        }
    };
    let _ = ws_tx.send(Message::Text(format!("{PANEL_PREFIX} {reason}"))).await;
    let _ = ws_tx
        .send(Message::Close(Some(CloseFrame {
            code: axum::extract::ws::close_code::NORMAL,
            reason: "log stream ended".into(),
        })))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use async_trait::async_trait;
    use botpanel_core::{BotController, MessageSender, PanelConfig};
    use botpanel_remote::{CommandOutput, MockConnector};
    use std::sync::Arc;

    struct NoSend;

    #[async_trait]
    impl MessageSender for NoSend {
        async fn send(&self, _token: &str, _chat_id: &str, _text: &str) -> botpanel_core::Result<()> {
            Ok(())
        }
    }

    fn state(mock: &MockConnector) -> AppState {
        let controller = BotController::new(
            Arc::new(mock.clone()),
            PanelConfig::new().with_node_env_prefix(""),
        );
        AppState::new(ApiConfig::default(), controller, Arc::new(NoSend))
    }

    #[tokio::test]
    async fn test_malformed_message_gets_error_reply() {
        let mock = MockConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(handle_dashboard_text(&state(&mock), "{not json", &tx).is_none());
        assert!(handle_dashboard_text(&state(&mock), r#"{"type":"reboot"}"#, &tx).is_none());

        for _ in 0..2 {
            match rx.recv().await.unwrap() {
                ObserverMessage::Error { message } => assert!(message.starts_with("invalid message")),
                other => panic!("unexpected message: {other:?}"),
            }
        }
        assert_eq!(mock.sessions_opened(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_request_streams_progress_and_refreshes() {
        let mock = MockConnector::new();
        mock.on_sequence(
            "pm2 jlist",
            vec![
                CommandOutput::ok(r#"[{"name":"shop","pm2_env":{"status":"online","pm_cwd":"/root/shop"}}]"#),
                CommandOutput::ok(r#"[{"name":"shop","pm2_env":{"status":"stopped","pm_cwd":"/root/shop"}}]"#),
            ],
        );
        let state = state(&mock);
        let mut observer = state.broadcaster.subscribe();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = handle_dashboard_text(
            &state,
            r#"{"type":"resetSession","data":{"name":"shop"}}"#,
            &tx,
        )
        .unwrap();
        task.await.unwrap();

        let mut progress = Vec::new();
        while let Ok(ObserverMessage::Progress { message }) = rx.try_recv() {
            progress.push(message);
        }
        assert!(progress.first().unwrap().contains("Stopping 'shop'"));
        assert!(progress.last().unwrap().contains("pairing code"));
        assert!(mock.executed("rm -rf '/root/shop/.wwebjs_auth'"));
        assert!(matches!(
            observer.try_recv(),
            Ok(ObserverMessage::StatusUpdate { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_runs_after_client_is_gone() {
        let mock = MockConnector::new();
        mock.on("pm2 jlist", CommandOutput::ok("[]"));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let task = handle_dashboard_text(
            &state(&mock),
            r#"{"type":"resetSession","data":{"name":"ghost"}}"#,
            &tx,
        )
        .unwrap();
        task.await.unwrap();
        assert!(mock.executed("pm2 jlist"));
    }
}
