//! Inbound side: events pushed by the source platform and the media fetch
//! capability that comes with them.

use {async_trait::async_trait, serde::Serialize};

use crate::{Result, identity::Identity};

/// Opaque capability for downloading one piece of media from the source
/// platform. Only the source adapter knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MediaHandle(String);

impl MediaHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Message type tag attached by the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawKind {
    Text,
    Media,
    Other(String),
}

impl RawKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "text" => Self::Text,
            "media" => Self::Media,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Text with link preview or quote context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtendedText {
    pub text: String,
    /// URL the preview was generated for, when there is one.
    pub matched_url: Option<String>,
}

/// A downloadable attachment as described by the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAttachment {
    pub handle: MediaHandle,
    pub caption: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl MediaAttachment {
    pub fn new(handle: MediaHandle) -> Self {
        Self {
            handle,
            caption: None,
            file_name: None,
            mime_type: None,
        }
    }
}

/// Message content, one optional part per shape the source can deliver.
///
/// Usually exactly one part is set; when several are, the classifier's
/// precedence decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawMessage {
    pub conversation: Option<String>,
    pub extended_text: Option<ExtendedText>,
    pub image: Option<MediaAttachment>,
    pub document: Option<MediaAttachment>,
    pub video: Option<MediaAttachment>,
    pub audio: Option<MediaAttachment>,
    /// Any other media envelope (stickers, video notes, unknown types).
    pub other_media: Option<MediaAttachment>,
}

/// A chat message received from the source platform.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEvent {
    pub message_id: String,
    pub chat: String,
    pub sender: Identity,
    pub sender_name: Option<String>,
    pub message_type: RawKind,
    pub payload: RawMessage,
}

/// Everything the source adapter pushes to its sink.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Message(MessageEvent),
    Connected { phone_number: Option<String> },
    Disconnected { reason: String },
}

/// Receiver of inbound events. The source adapter calls this once per event,
/// each call on its own task.
#[async_trait]
pub trait InboundEventSink: Send + Sync {
    async fn on_event(&self, event: InboundEvent);
}

/// Fetch media bytes from the source platform.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn download(&self, handle: &MediaHandle) -> Result<Vec<u8>>;
}
