use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sidecar::DEFAULT_SIDECAR_PORT;

/// `[channels.whatsapp]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Session name inside the sidecar. One linked device per account.
    pub account_id: String,

    /// Port of the sidecar's local WebSocket server.
    pub sidecar_port: u16,

    /// Directory containing the sidecar's `package.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar_dir: Option<PathBuf>,

    /// Where the sidecar keeps the paired session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_dir: Option<PathBuf>,

    /// Spawn and supervise the sidecar process. Turn off to run it by hand.
    pub auto_start_sidecar: bool,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            account_id: "default".into(),
            sidecar_port: DEFAULT_SIDECAR_PORT,
            sidecar_dir: None,
            auth_dir: None,
            auto_start_sidecar: true,
        }
    }
}
