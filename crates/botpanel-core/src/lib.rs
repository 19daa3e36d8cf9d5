//! Bot orchestration for the remote control panel.
//!
//! The remote host's process manager and filesystem are the only source of
//! truth. Nothing is cached between calls: every operation opens a session,
//! re-reads what it needs and closes the session again.
//!
//! - [`BotController`] locates bots and runs lifecycle operations
//!   (add, manage, env, delete, logs, update, log follow)
//! - notification channels live in the bot's `.env` ([`env_file`]) and are
//!   consumed by a generated notifier module ([`shim`], [`notifier`])
//! - [`BotController::reset_session`] wipes a bot's session directory safely
//! - [`StatusBroadcaster`] pushes the process table to observers

pub mod broadcaster;
pub mod config;
pub mod env_file;
pub mod error;
pub mod lifecycle;
pub mod locator;
pub mod notifier;
pub mod observer;
pub mod poll;
pub mod process;
pub mod reset;
pub mod shim;
pub mod telegram;
pub mod toolchain;
pub mod transcript;

pub use broadcaster::StatusBroadcaster;
pub use config::PanelConfig;
pub use env_file::NotificationChannel;
pub use error::{PanelError, Result};
pub use lifecycle::{BotController, NewBot};
pub use locator::BotLocation;
pub use notifier::{InjectionReport, NotificationSettings};
pub use observer::{ObserverMessage, ProgressSink};
pub use poll::PollPolicy;
pub use process::{BotProcess, BotStatus, ProcessAction};
pub use telegram::{MessageSender, TelegramSender};
