//! Sidecar frames to channel events.

use {
    courier_channels::{
        ExtendedText, Identity, MediaAttachment, MediaHandle, MessageEvent, RawKind, RawMessage,
    },
    serde_json::Value,
    tracing::debug,
};

use crate::types::{WireMedia, WireMessage};

/// Parts that only wrap another message.
const WRAPPERS: &[&str] = &[
    "ephemeralMessage",
    "viewOnceMessage",
    "viewOnceMessageV2",
    "viewOnceMessageV2Extension",
    "documentWithCaptionMessage",
    "editedMessage",
];

const MAX_WRAPPER_DEPTH: usize = 4;

/// Fields of an `inbound_message` frame.
pub struct InboundFrame<'a> {
    pub message_id: &'a str,
    pub chat_jid: &'a str,
    pub sender_jid: &'a str,
    pub sender_name: Option<&'a str>,
    pub message_type: &'a str,
    pub message: &'a Value,
}

pub fn message_event(frame: &InboundFrame<'_>) -> MessageEvent {
    MessageEvent {
        message_id: frame.message_id.to_string(),
        chat: frame.chat_jid.to_string(),
        sender: Identity::parse(frame.sender_jid),
        sender_name: frame.sender_name.map(str::to_string),
        message_type: RawKind::from_tag(frame.message_type),
        payload: raw_message(frame.message_id, frame.message),
    }
}

/// Map the message proto onto [`RawMessage`]. Media parts get the message
/// id as their download handle. Malformed input yields an empty message.
pub fn raw_message(message_id: &str, message: &Value) -> RawMessage {
    let message = unwrap_wrappers(message);
    let wire = match serde_json::from_value::<WireMessage>(message.clone()) {
        Ok(wire) => wire,
        Err(e) => {
            debug!(message_id, error = %e, "unreadable message payload");
            return RawMessage::default();
        },
    };

    let attach = |media: WireMedia| MediaAttachment {
        handle: MediaHandle::new(message_id),
        caption: media.caption,
        file_name: media.file_name,
        mime_type: media.mimetype,
    };

    let other_media = wire
        .other
        .iter()
        .filter(|(key, _)| key.ends_with("Message"))
        .filter_map(|(_, value)| serde_json::from_value::<WireMedia>(value.clone()).ok())
        .find(WireMedia::is_downloadable)
        .map(attach);

    RawMessage {
        conversation: wire.conversation,
        extended_text: wire.extended_text_message.map(|ext| ExtendedText {
            text: ext.text.unwrap_or_default(),
            matched_url: ext.matched_text,
        }),
        image: wire.image_message.map(attach),
        document: wire.document_message.map(attach),
        video: wire.video_message.map(attach),
        audio: wire.audio_message.map(attach),
        other_media,
    }
}

fn unwrap_wrappers(mut message: &Value) -> &Value {
    for _ in 0..MAX_WRAPPER_DEPTH {
        let inner = WRAPPERS.iter().find_map(|key| {
            message
                .get(key)
                .and_then(|wrapper| wrapper.get("message"))
                .filter(|inner| inner.is_object())
        });
        match inner {
            Some(inner) => message = inner,
            None => break,
        }
    }
    message
}
