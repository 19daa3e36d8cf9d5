//! HTTP and WebSocket surface of the bot control panel.
//!
//! Thin plumbing over [`botpanel_core`]:
//! - REST routes under `/api/bots` for lifecycle and notification operations
//! - `/ws/dashboard` pushes the process table and runs session resets
//! - `/ws/logs/:name` follows a bot's raw log output
//!
//! Authentication is not handled here; bind to loopback or put the panel
//! behind an authenticating proxy.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use botpanel_api::{serve, ApiConfig, AppState};
//! use botpanel_core::{BotController, PanelConfig, TelegramSender};
//!
//! let controller = BotController::new(connector, PanelConfig::default());
//! let state = AppState::new(ApiConfig::default(), controller, Arc::new(TelegramSender::new()));
//! serve(state, shutdown).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use router::{create_router, serve};
pub use state::AppState;
