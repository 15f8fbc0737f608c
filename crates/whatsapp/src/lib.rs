//! WhatsApp Web source for courier.
//!
//! The WhatsApp Web protocol is spoken by a Baileys (Node.js) sidecar
//! process. This crate starts that process, talks to it over a local
//! WebSocket, turns its frames into `InboundEvent`s and fetches media on
//! request.

pub mod bridge;
pub mod config;
pub mod convert;
pub mod process;
pub mod sidecar;
pub mod types;

pub use {
    bridge::WhatsAppBridge,
    config::WhatsAppConfig,
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir, start_sidecar},
    sidecar::DEFAULT_SIDECAR_PORT,
    types::ConnectionState,
};
