//! Configuration loading, validation and env substitution.
//!
//! Config files: `courier.toml`, `courier.yaml`, or `courier.json`
//! Searched in `./` then `~/.config/courier/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod live;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    live::{ENV_AUTHORIZED_SENDER, ENV_DESTINATION_CHAT_ID, LiveRelayConfig},
    loader::{
        config_dir, data_dir, discover_and_load, find_config_file, load_config, load_config_value,
    },
    schema::{ChannelsConfig, CourierConfig, RelayConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
