//! Telegram binding for the whisper relay.
//!
//! Long-polls the Bot API with teloxide, answers inline queries with whisper
//! cards and "view" button presses with reveals.

pub mod bot;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod state;

pub use {
    bot::start_polling,
    directory::TelegramDirectory,
    error::{Error, Result},
    outbound::TelegramOutbound,
    state::RelayState,
};
