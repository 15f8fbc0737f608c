//! Telegram destination for courier.
//!
//! Wraps a teloxide `Bot` and exposes it as a `DestinationOutbound`: plain
//! text, photos, documents and videos posted into a single chat.

pub mod bot;
pub mod config;
pub mod error;
pub mod outbound;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod test_api;

pub use {
    bot::{build_bot, connect},
    config::TelegramConfig,
    error::{Error, Result},
    outbound::TelegramOutbound,
};
