use courier_config::{LiveRelayConfig, RelayConfig};

/// Source of the relay settings, queried once per inbound event.
pub trait SettingsProvider: Send + Sync {
    fn relay_settings(&self) -> RelayConfig;
}

impl SettingsProvider for LiveRelayConfig {
    fn relay_settings(&self) -> RelayConfig {
        self.snapshot()
    }
}

/// Fixed settings.
impl SettingsProvider for RelayConfig {
    fn relay_settings(&self) -> RelayConfig {
        self.clone()
    }
}
