//! Application state shared across handlers.

use std::sync::Arc;

use botpanel_core::broadcaster::DEFAULT_CAPACITY;
use botpanel_core::{BotController, MessageSender, StatusBroadcaster};

use crate::config::ApiConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Remote bot operations.
    pub controller: BotController,
    /// Delivery for test notifications.
    pub sender: Arc<dyn MessageSender>,
    /// Process table push to dashboard observers.
    pub broadcaster: StatusBroadcaster,
}

impl AppState {
    /// Creates the state; the broadcaster shares `controller`.
    pub fn new(config: ApiConfig, controller: BotController, sender: Arc<dyn MessageSender>) -> Self {
        let broadcaster = StatusBroadcaster::new(controller.clone(), DEFAULT_CAPACITY);
        Self {
            config: Arc::new(config),
            controller,
            sender,
            broadcaster,
        }
    }

    /// Pushes a fresh process table to observers in the background.
    pub fn refresh_observers(&self) {
        if self.broadcaster.observer_count() == 0 {
            return;
        }
        let broadcaster = self.broadcaster.clone();
        tokio::spawn(async move {
            broadcaster.broadcast_now().await;
        });
    }
}
