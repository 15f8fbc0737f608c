/// Config schema types (relay settings and channel sections).
use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub relay: RelayConfig,
    pub channels: ChannelsConfig,
}

/// Relay settings. Re-read on every inbound event, so changes apply without
/// a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// The only sender whose messages are relayed (phone number or JID).
    #[serde(deserialize_with = "deserialize_scalar_text")]
    pub authorized_sender: Option<String>,
    /// Destination Telegram chat. Kept as text so that a malformed value
    /// only drops events instead of failing the whole config.
    #[serde(deserialize_with = "deserialize_scalar_text")]
    pub destination_chat_id: Option<String>,
    /// Upper bound for fetching one media attachment from the source.
    pub download_timeout_secs: u64,
    /// Upper bound for one send call to the destination.
    pub send_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            authorized_sender: None,
            destination_chat_id: None,
            download_timeout_secs: 60,
            send_timeout_secs: 60,
        }
    }
}

/// Channel sections, parsed by the channel crates themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub telegram: serde_json::Map<String, serde_json::Value>,
    pub whatsapp: serde_json::Map<String, serde_json::Value>,
}

impl ChannelsConfig {
    /// The telegram section as a JSON object, ready for `serde_json::from_value`.
    pub fn telegram_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.telegram.clone())
    }

    /// The whatsapp section as a JSON object, ready for `serde_json::from_value`.
    pub fn whatsapp_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.whatsapp.clone())
    }
}

/// Accept any scalar and keep its text. Numbers are the natural way to
/// write phone numbers and chat ids; anything else is left for per-event
/// parsing to reject.
fn deserialize_scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<serde_json::Value>::deserialize(deserializer)?.and_then(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }),
    )
}
