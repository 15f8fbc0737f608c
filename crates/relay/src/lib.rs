//! Relay core for courier.
//!
//! Receives inbound chat events from the source platform, keeps only those
//! sent by the single authorized sender, classifies their content and makes
//! one matching send to the destination chat.

pub mod access;
pub mod classify;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod media;
pub mod settings;

#[cfg(test)]
mod test_support;

pub use {
    access::{AccessDenied, check_sender},
    classify::{Kind, classify, classify_content},
    controller::{DropReason, RelayController, RelayOutcome},
    dispatch::{ClassifiedMessage, DestinationTarget, Dispatcher},
    error::{Error, Result},
    media::{MediaRef, PLACEHOLDER_NAME, resolve},
    settings::SettingsProvider,
};
