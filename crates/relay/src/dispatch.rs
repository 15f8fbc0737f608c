//! Dispatch: turn a classified message into exactly one destination call.

use std::sync::Arc;

use {
    courier_channels::{DestinationOutbound, OutboundFile, RawMessage},
    tracing::debug,
};

use crate::{
    classify::Kind,
    error::{Error, Result},
    media::{MediaRef, PLACEHOLDER_NAME, placeholder_file_name, resolve},
};

/// The chat messages are relayed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationTarget {
    pub chat_id: i64,
}

impl DestinationTarget {
    /// Parse a configured chat id such as `-1001234567890`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        value
            .parse::<i64>()
            .map(|chat_id| Self { chat_id })
            .map_err(|source| Error::InvalidDestination {
                value: value.to_string(),
                source,
            })
    }
}

/// A message reduced to what the destination needs. `media` is set exactly
/// for media kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedMessage {
    pub kind: Kind,
    pub text: Option<String>,
    pub media: Option<MediaRef>,
}

impl ClassifiedMessage {
    pub fn new(raw: &RawMessage, kind: Kind) -> Self {
        let text = match kind {
            Kind::UrlText => raw.extended_text.as_ref().map(|t| t.text.clone()),
            Kind::Text => raw.conversation.clone(),
            _ => None,
        };
        Self {
            kind,
            text,
            media: resolve(raw, kind),
        }
    }
}

/// Sends classified messages to the destination platform.
#[derive(Clone)]
pub struct Dispatcher {
    outbound: Arc<dyn DestinationOutbound>,
}

impl Dispatcher {
    pub fn new(outbound: Arc<dyn DestinationOutbound>) -> Self {
        Self { outbound }
    }

    /// Make the single outbound call for `message`. `bytes` is the downloaded
    /// attachment for media kinds and ignored otherwise.
    pub async fn dispatch(
        &self,
        target: DestinationTarget,
        message: &ClassifiedMessage,
        bytes: Option<Vec<u8>>,
    ) -> Result<()> {
        let chat_id = target.chat_id;
        match (message.kind, &message.media, bytes) {
            (Kind::Text | Kind::UrlText, ..) => {
                let text = message.text.as_deref().unwrap_or_default();
                debug!(chat_id, kind = %message.kind, len = text.len(), "sending text");
                self.outbound.send_text(chat_id, text).await?;
            },
            (Kind::Image, Some(media), Some(bytes)) => {
                let file = OutboundFile::new(media.filename.clone(), bytes);
                self.outbound
                    .send_photo(chat_id, file, media.caption.as_deref())
                    .await?;
            },
            (Kind::Document, Some(media), Some(bytes)) => {
                let file = OutboundFile::new(media.filename.clone(), bytes);
                self.outbound
                    .send_document(chat_id, file, media.caption.as_deref())
                    .await?;
            },
            (Kind::Video, Some(media), Some(bytes)) => {
                let file = OutboundFile::new(media.filename.clone(), bytes);
                self.outbound
                    .send_video(chat_id, file, media.caption.as_deref())
                    .await?;
            },
            (Kind::Audio | Kind::UnknownMedia, Some(media), Some(bytes)) => {
                let name = placeholder_file_name(media.mime_type.as_deref());
                let file = OutboundFile::new(name, bytes);
                self.outbound
                    .send_document(chat_id, file, Some(PLACEHOLDER_NAME))
                    .await?;
            },
            (kind, ..) => return Err(Error::NothingToDispatch { kind }),
        }
        Ok(())
    }
}
