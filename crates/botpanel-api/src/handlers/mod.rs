//! API request handlers.

pub mod bots;
pub mod health;
pub mod notifications;
pub mod ws;

pub use bots::*;
pub use health::*;
pub use notifications::*;
pub use ws::*;
