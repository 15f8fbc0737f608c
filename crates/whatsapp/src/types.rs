//! Sidecar wire protocol: JSON text frames tagged by `type`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Frames sent to the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Open (or resume) the session for an account. Triggers `qr` frames
    /// when the account is not paired yet.
    Login {
        account_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_dir: Option<PathBuf>,
    },
    Logout {
        account_id: String,
    },
    /// Fetch and decrypt the media of a message the sidecar delivered.
    DownloadMedia {
        request_id: String,
        account_id: String,
        message_id: String,
    },
}

/// Frames received from the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    Qr {
        account_id: String,
        qr: String,
    },
    Connected {
        account_id: String,
        #[serde(default)]
        phone_number: Option<String>,
    },
    Disconnected {
        account_id: String,
        reason: String,
    },
    LoggedOut {
        account_id: String,
    },
    InboundMessage {
        account_id: String,
        message_id: String,
        chat_jid: String,
        sender_jid: String,
        #[serde(default)]
        sender_name: Option<String>,
        message_type: String,
        /// The message proto as JSON.
        #[serde(default)]
        message: serde_json::Value,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    MediaDownloaded {
        request_id: String,
        /// Base64 bytes.
        data: String,
    },
    MediaDownloadFailed {
        request_id: String,
        error: String,
    },
    Error {
        #[serde(default)]
        account_id: Option<String>,
        error: String,
    },
}

/// The parts of the WhatsApp message proto the relay understands.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireMessage {
    pub conversation: Option<String>,
    pub extended_text_message: Option<WireExtendedText>,
    pub image_message: Option<WireMedia>,
    pub document_message: Option<WireMedia>,
    pub video_message: Option<WireMedia>,
    pub audio_message: Option<WireMedia>,
    /// Every other part, kept raw.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireExtendedText {
    pub text: Option<String>,
    pub matched_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireMedia {
    pub caption: Option<String>,
    pub file_name: Option<String>,
    pub mimetype: Option<String>,
    pub media_key: Option<serde_json::Value>,
    pub direct_path: Option<String>,
    pub url: Option<String>,
}

impl WireMedia {
    /// Whether the part carries what the sidecar needs to download it.
    pub fn is_downloadable(&self) -> bool {
        self.media_key.is_some() || self.direct_path.is_some() || self.url.is_some()
    }
}

/// Pairing state of the WhatsApp session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    WaitingForQr,
    QrReceived(String),
    Connected { phone_number: Option<String> },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_frames_are_snake_case_tagged() {
        let json = serde_json::to_value(GatewayMessage::DownloadMedia {
            request_id: "r1".into(),
            account_id: "default".into(),
            message_id: "ABC".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "download_media");
        assert_eq!(json["message_id"], "ABC");

        let login = serde_json::to_value(GatewayMessage::Login {
            account_id: "default".into(),
            auth_dir: None,
        })
        .unwrap();
        assert_eq!(login, serde_json::json!({"type": "login", "account_id": "default"}));
    }

    #[test]
    fn parses_inbound_message() {
        let frame = r#"{
            "type": "inbound_message",
            "account_id": "default",
            "message_id": "3EB0",
            "chat_jid": "15551234567@s.whatsapp.net",
            "sender_jid": "15551234567:3@s.whatsapp.net",
            "message_type": "media",
            "message": {"imageMessage": {"caption": "cat.png", "mimetype": "image/png"}}
        }"#;
        let msg: SidecarMessage = serde_json::from_str(frame).unwrap();
        let SidecarMessage::InboundMessage {
            message_id,
            sender_name,
            message,
            ..
        } = msg
        else {
            panic!("expected inbound_message");
        };
        assert_eq!(message_id, "3EB0");
        assert!(sender_name.is_none());
        let wire: WireMessage = serde_json::from_value(message).unwrap();
        assert_eq!(
            wire.image_message.unwrap().caption.as_deref(),
            Some("cat.png")
        );
    }

    #[test]
    fn unknown_parts_are_kept() {
        let wire: WireMessage = serde_json::from_value(serde_json::json!({
            "stickerMessage": {"mediaKey": "a2V5", "mimetype": "image/webp"},
            "messageContextInfo": {}
        }))
        .unwrap();
        assert!(wire.other.contains_key("stickerMessage"));
        assert!(wire.other.contains_key("messageContextInfo"));
    }
}
