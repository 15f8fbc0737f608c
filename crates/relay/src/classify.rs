//! Content classification.
//!
//! Maps an inbound message to the single [`Kind`] that decides how it is
//! forwarded. Pure and total: every input yields a kind.

use courier_channels::{MessageEvent, RawMessage};

use crate::access::check_sender;

/// Semantic kind of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Text,
    UrlText,
    Image,
    Document,
    Video,
    Audio,
    UnknownMedia,
    Ignored,
}

impl Kind {
    /// Kinds that carry a downloadable attachment.
    pub fn is_media(self) -> bool {
        matches!(
            self,
            Self::Image | Self::Document | Self::Video | Self::Audio | Self::UnknownMedia
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::UrlText => "url-text",
            Self::Image => "image",
            Self::Document => "document",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::UnknownMedia => "unknown-media",
            Self::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a message, honoring only the `authorized` sender.
pub fn classify(event: &MessageEvent, authorized: Option<&str>) -> Kind {
    if check_sender(&event.sender, authorized).is_err() {
        return Kind::Ignored;
    }
    classify_content(&event.payload)
}

/// Classify message content alone. First match wins: link text, then the
/// typed attachments, then plain text, then any other media envelope.
pub fn classify_content(raw: &RawMessage) -> Kind {
    if raw.extended_text.is_some() {
        Kind::UrlText
    } else if raw.image.is_some() {
        Kind::Image
    } else if raw.document.is_some() {
        Kind::Document
    } else if raw.video.is_some() {
        Kind::Video
    } else if raw.audio.is_some() {
        Kind::Audio
    } else if raw.conversation.is_some() {
        Kind::Text
    } else if raw.other_media.is_some() {
        Kind::UnknownMedia
    } else {
        Kind::Ignored
    }
}
