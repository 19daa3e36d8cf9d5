//! Direct message delivery for testing a channel.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::Recipient;
use teloxide::RequestError;
use tracing::{debug, warn};

use crate::error::{PanelError, Result};

/// Message used when the caller sends none.
pub const DEFAULT_TEST_MESSAGE: &str = "Test message from the bot control panel.";

/// Sends a single message through a notification provider.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `text` to `chat_id` using `token`. Errors carry the provider's
    /// own description when it gave one.
    async fn send(&self, token: &str, chat_id: &str, text: &str) -> Result<()>;
}

/// Sends through the Telegram Bot API.
#[derive(Debug, Clone, Default)]
pub struct TelegramSender;

impl TelegramSender {
    /// Creates a sender.
    pub fn new() -> Self {
        Self
    }
}

/// Numeric ids are chats; anything else is a public channel username.
pub fn recipient(chat_id: &str) -> Recipient {
    let chat_id = chat_id.trim();
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if chat_id.starts_with('@') => Recipient::ChannelUsername(chat_id.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{chat_id}")),
    }
}

fn describe(err: RequestError) -> String {
    match err {
        RequestError::Api(api) => api.to_string(),
        other => format!("telegram request failed: {other}"),
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, token: &str, chat_id: &str, text: &str) -> Result<()> {
        if token.trim().is_empty() || chat_id.trim().is_empty() {
            return Err(PanelError::InvalidInput(
                "token and chat id are required".to_string(),
            ));
        }
        let bot = Bot::new(token.trim());
        match bot.send_message(recipient(chat_id), text).await {
            Ok(_) => {
                debug!(chat_id = %chat_id, "test message sent");
                Ok(())
            }
            Err(e) => {
                let description = describe(e);
                warn!(chat_id = %chat_id, error = %description, "test message failed");
                Err(PanelError::Delivery(description))
            }
        }
    }
}

/// Sends a test message, falling back to [`DEFAULT_TEST_MESSAGE`].
pub async fn send_test(
    sender: &dyn MessageSender,
    token: &str,
    chat_id: &str,
    message: Option<&str>,
) -> Result<()> {
    let text = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_TEST_MESSAGE);
    sender.send(token, chat_id, text).await
}
