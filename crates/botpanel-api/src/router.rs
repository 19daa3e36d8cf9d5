//! Router configuration and server setup.

use std::future::Future;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::handlers;
use crate::state::AppState;

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Creates the API router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Health
        .route("/api/health", get(handlers::health))
        // Lifecycle
        .route("/api/bots", get(handlers::list_bots))
        .route("/api/bots/add-from-git", post(handlers::add_bot))
        .route("/api/bots/manage", post(handlers::manage_bot))
        .route(
            "/api/bots/env/:name",
            get(handlers::get_env).post(handlers::update_env),
        )
        .route("/api/bots/delete/:name", delete(handlers::delete_bot))
        .route("/api/bots/logs/:name", get(handlers::get_logs))
        .route("/api/bots/update/:name", post(handlers::update_bot))
        // Notifications
        .route(
            "/api/bots/notifications/test",
            post(handlers::send_test_notification),
        )
        .route(
            "/api/bots/notifications/:name",
            get(handlers::get_notifications).post(handlers::save_notification),
        )
        .route(
            "/api/bots/notifications/:name/:id",
            delete(handlers::delete_notification),
        )
        .route(
            "/api/bots/inject-notifier/:name",
            post(handlers::inject_notifier),
        )
        // Observers
        .route("/ws/dashboard", get(handlers::dashboard_ws))
        .route("/ws/logs/:name", get(handlers::logs_ws))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and runs until `shutdown` completes.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use botpanel_core::{BotController, MessageSender, PanelConfig, PanelError};
    use botpanel_remote::{CommandOutput, MockConnector};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    const JLIST: &str = r#"[{"name":"shop","pm_id":0,"pid":42,"monit":{"memory":1024,"cpu":1.5},
        "pm2_env":{"status":"online","pm_cwd":"/root/shop","restart_time":2}}]"#;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, String, String)>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl MessageSender for Outbox {
        async fn send(&self, token: &str, chat_id: &str, text: &str) -> botpanel_core::Result<()> {
            if let Some(reason) = &self.fail_with {
                return Err(PanelError::Delivery(reason.clone()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((token.into(), chat_id.into(), text.into()));
            Ok(())
        }
    }

    fn server_with(mock: &MockConnector, outbox: Arc<Outbox>) -> TestServer {
        let controller = BotController::new(
            Arc::new(mock.clone()),
            PanelConfig::new().with_node_env_prefix(""),
        );
        let state = AppState::new(ApiConfig::default(), controller, outbox);
        TestServer::new(create_router(state)).unwrap()
    }

    fn server(mock: &MockConnector) -> TestServer {
        server_with(mock, Arc::new(Outbox::default()))
    }

    fn with_shop() -> MockConnector {
        let mock = MockConnector::new();
        mock.on("pm2 jlist", CommandOutput::ok(JLIST));
        mock.with_file("/root/shop/package.json", r#"{"main":"index.js"}"#);
        mock.with_file("/root/shop/index.js", "sendNotification('sales', 'hi');\n");
        mock
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let mock = MockConnector::new();
        let response = server(&mock).get("/api/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["observers"], 0);
        assert!(!body["version"].as_str().unwrap().is_empty());
        assert_eq!(mock.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_list_bots() {
        let mock = with_shop();
        let response = server(&mock).get("/api/bots").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["total"], 1);
        assert_eq!(body["bots"][0]["name"], "shop");
        assert_eq!(body["bots"][0]["status"], "running");
        assert_eq!(body["bots"][0]["workingDirectory"], "/root/shop");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_service_unavailable() {
        let mock = MockConnector::new();
        mock.fail_connect("connection refused");

        let response = server(&mock).get("/api/bots").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_manage_bot() {
        let mock = MockConnector::new();
        let response = server(&mock)
            .post("/api/bots/manage")
            .json(&json!({ "name": "shop", "action": "restart" }))
            .await;
        response.assert_status_ok();
        assert!(mock.executed("pm2 restart 'shop'"));
    }

    #[tokio::test]
    async fn test_manage_failure_carries_remote_stderr() {
        let mock = MockConnector::new();
        mock.on("pm2 stop", CommandOutput::failed(1, "[PM2][ERROR] Process shop not found"));

        let response = server(&mock)
            .post("/api/bots/manage")
            .json(&json!({ "name": "shop", "action": "stop" }))
            .await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"], "[PM2][ERROR] Process shop not found");
    }

    #[tokio::test]
    async fn test_env_round_trip() {
        let mock = with_shop();
        mock.with_file("/root/shop/.env", "PORT=1\n");
        let server = server(&mock);

        let body: Value = server.get("/api/bots/env/shop").await.json();
        assert_eq!(body["envContent"], "PORT=1\n");

        let response = server
            .post("/api/bots/env/shop")
            .json(&json!({ "envContent": "PORT=2\n" }))
            .await;
        response.assert_status_ok();
        assert_eq!(mock.file("/root/shop/.env").unwrap(), "PORT=2\n");
        assert_eq!(mock.file("/root/shop/.env.bak").unwrap(), "PORT=1\n");
    }

    #[tokio::test]
    async fn test_env_saved_but_reload_failed() {
        let mock = with_shop();
        mock.on("pm2 reload", CommandOutput::failed(1, "reload boom"));

        let response = server(&mock)
            .post("/api/bots/env/shop")
            .json(&json!({ "envContent": "PORT=2\n" }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["configSaved"], true);
        assert!(body["error"].as_str().unwrap().contains("reload boom"));
    }

    #[tokio::test]
    async fn test_unknown_bot_is_not_found() {
        let mock = MockConnector::new();
        mock.on("pm2 jlist", CommandOutput::ok("[]"));

        let response = server(&mock).get("/api/bots/env/ghost").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_add_bot_into_existing_directory_conflicts() {
        let mock = MockConnector::new();
        mock.with_file("/root/shop/index.js", "x");

        let response = server(&mock)
            .post("/api/bots/add-from-git")
            .json(&json!({ "name": "shop", "gitUrl": "https://example.com/shop.git" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert!(!mock.executed("git clone"));
    }

    #[tokio::test]
    async fn test_add_bot_returns_transcript() {
        let mock = MockConnector::new();
        mock.on("ls -A '/root/newbot'", CommandOutput::failed(1, ""));
        mock.with_file("/root/newbot/package.json", r#"{"main":"bot.js"}"#);

        let response = server(&mock)
            .post("/api/bots/add-from-git")
            .json(&json!({
                "name": "newbot",
                "gitUrl": "https://example.com/newbot.git",
                "envContent": "PORT=1\n"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert!(body["output"].as_str().unwrap().contains("git clone"));
    }

    #[tokio::test]
    async fn test_bad_bot_name_is_rejected() {
        let mock = MockConnector::new();
        let response = server(&mock)
            .post("/api/bots/add-from-git")
            .json(&json!({ "name": "../etc", "gitUrl": "https://example.com/x.git" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(mock.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_update_failure_returns_transcript() {
        let mock = with_shop();
        mock.on("symbolic-ref", CommandOutput::ok("refs/remotes/origin/main\n"));
        mock.on("fetch origin", CommandOutput::failed(128, "fatal: could not read from remote"));

        let response = server(&mock).post("/api/bots/update/shop").await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert!(body["output"].as_str().unwrap().contains("fetch origin"));
        assert!(body["error"].as_str().unwrap().contains("could not read from remote"));
    }

    #[tokio::test]
    async fn test_update_with_new_remote() {
        let mock = with_shop();
        mock.on("symbolic-ref", CommandOutput::ok("refs/remotes/origin/main\n"));

        let response = server(&mock)
            .post("/api/bots/update/shop")
            .json(&json!({ "gitUrl": "https://example.com/new.git" }))
            .await;
        response.assert_status_ok();
        assert!(mock.executed("remote set-url origin 'https://example.com/new.git'"));
    }

    #[tokio::test]
    async fn test_logs_with_line_count() {
        let mock = MockConnector::new();
        mock.on("pm2 logs", CommandOutput::ok("hello\n"));

        let response = server(&mock).get("/api/bots/logs/shop?lines=5").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["logs"], "hello\n");
        assert!(mock.executed("--lines 5 --nostream"));
    }

    #[tokio::test]
    async fn test_delete_bot() {
        let mock = MockConnector::new();
        let response = server(&mock).delete("/api/bots/delete/shop").await;
        response.assert_status_ok();
        assert!(mock.executed("pm2 delete 'shop'"));
    }

    #[tokio::test]
    async fn test_notification_settings() {
        let mock = with_shop();
        mock.with_file(
            "/root/shop/.env",
            "TELEGRAM_NAME_1=\"Ops\"\nTELEGRAM_TOKEN_1=\"t\"\nTELEGRAM_CHAT_ID_1=\"c\"\n",
        );

        let body: Value = server(&mock).get("/api/bots/notifications/shop").await.json();
        assert_eq!(body["notifications"][0]["name"], "Ops");
        assert_eq!(body["notifications"][0]["chatId"], "c");
        assert_eq!(body["notifierInjected"], false);
        assert_eq!(body["foundPurposes"], json!(["sales"]));
    }

    #[tokio::test]
    async fn test_save_and_remove_notification() {
        let mock = with_shop();
        let server = server(&mock);

        let response = server
            .post("/api/bots/notifications/shop")
            .json(&json!({
                "id": "1",
                "name": "Ops",
                "purpose": "sales",
                "token": "123:abc",
                "chatId": "-100"
            }))
            .await;
        response.assert_status_ok();
        let env = mock.file("/root/shop/.env").unwrap();
        assert!(env.contains("TELEGRAM_TOKEN_1=\"123:abc\""));
        assert!(mock.file("/root/shop/telegramNotifier.js").is_some());

        let response = server.delete("/api/bots/notifications/shop/1").await;
        response.assert_status_ok();
        assert!(!mock.file("/root/shop/.env").unwrap().contains("TELEGRAM_TOKEN_1"));
    }

    #[tokio::test]
    async fn test_invalid_notification_is_bad_request() {
        let mock = with_shop();
        let response = server(&mock)
            .post("/api/bots/notifications/shop")
            .json(&json!({ "id": 1, "name": "Ops", "token": "", "chatId": "c" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(mock.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_send_test_notification() {
        let mock = MockConnector::new();
        let outbox = Arc::new(Outbox::default());
        let server = server_with(&mock, outbox.clone());

        let response = server
            .post("/api/bots/notifications/test")
            .json(&json!({ "token": "123:abc", "chatId": "42" }))
            .await;
        response.assert_status_ok();

        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "42");
        assert_eq!(sent[0].2, botpanel_core::telegram::DEFAULT_TEST_MESSAGE);
        assert_eq!(mock.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_send_test_surfaces_provider_error() {
        let mock = MockConnector::new();
        let outbox = Arc::new(Outbox {
            fail_with: Some("Bad Request: chat not found".into()),
            ..Outbox::default()
        });

        let response = server_with(&mock, outbox)
            .post("/api/bots/notifications/test")
            .json(&json!({ "token": "123:abc", "chatId": "42", "message": "hi" }))
            .await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_inject_notifier() {
        let mock = with_shop();
        let response = server(&mock).post("/api/bots/inject-notifier/shop").await;
        response.assert_status_ok();
        assert!(mock
            .file("/root/shop/index.js")
            .unwrap()
            .contains("require('./telegramNotifier.js')"));
        assert!(mock.executed("pm2 reload 'shop'"));
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let mock = MockConnector::new();
        let response = server(&mock)
            .get("/api/health")
            .add_header(
                axum::http::header::ORIGIN,
                HeaderValue::from_static("http://localhost:5173"),
            )
            .await;
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
