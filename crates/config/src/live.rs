//! Relay settings that can change while the process runs.
//!
//! The `[relay]` section is held behind a lock and can be reloaded from disk
//! (the CLI does this on SIGHUP). On top of that, every snapshot consults the
//! `COURIER_AUTHORIZED_SENDER` and `COURIER_DESTINATION_CHAT_ID` environment
//! variables at the time of the call.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use tracing::info;

use crate::{loader::load_config, schema::RelayConfig};

/// Overrides `relay.authorized_sender`.
pub const ENV_AUTHORIZED_SENDER: &str = "COURIER_AUTHORIZED_SENDER";
/// Overrides `relay.destination_chat_id`.
pub const ENV_DESTINATION_CHAT_ID: &str = "COURIER_DESTINATION_CHAT_ID";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Shared, reloadable relay settings.
pub struct LiveRelayConfig {
    current: RwLock<RelayConfig>,
    source: Option<PathBuf>,
    env: EnvLookup,
}

impl LiveRelayConfig {
    pub fn new(config: RelayConfig, source: Option<PathBuf>) -> Self {
        Self {
            current: RwLock::new(config),
            source,
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replace the environment lookup (tests use a fixed map).
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Arc::new(lookup);
        self
    }

    /// The file this config was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Current settings with environment overrides applied.
    pub fn snapshot(&self) -> RelayConfig {
        let mut config = self
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(sender) = non_empty((self.env)(ENV_AUTHORIZED_SENDER)) {
            config.authorized_sender = Some(sender);
        }
        if let Some(chat_id) = non_empty((self.env)(ENV_DESTINATION_CHAT_ID)) {
            config.destination_chat_id = Some(chat_id);
        }
        config
    }

    /// Swap in a new `[relay]` section.
    pub fn replace(&self, config: RelayConfig) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = config;
    }

    /// Re-read the source file. Returns `false` when there is no file to
    /// reload from. On error the previous settings stay in place.
    pub fn reload(&self) -> anyhow::Result<bool> {
        let Some(path) = self.source.as_deref() else {
            return Ok(false);
        };
        let config = load_config(path)?;
        info!(path = %path.display(), "relay settings reloaded");
        self.replace(config.relay);
        Ok(true)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
