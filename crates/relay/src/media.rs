//! Media resolution: pick the attachment matching a classified kind and work
//! out what to call it on the destination side.

use courier_channels::{MediaAttachment, MediaHandle, RawMessage};

use crate::classify::Kind;

/// Name used when neither a platform filename nor a caption is available.
pub const PLACEHOLDER_NAME: &str = "attachment";

/// A downloadable attachment plus its display metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub handle: MediaHandle,
    pub filename: String,
    pub caption: Option<String>,
    pub mime_type: Option<String>,
}

/// Resolve the attachment for `kind`. `None` for non-media kinds, or when
/// the matching part is absent.
pub fn resolve(raw: &RawMessage, kind: Kind) -> Option<MediaRef> {
    let attachment = match kind {
        Kind::Image => raw.image.as_ref(),
        Kind::Document => raw.document.as_ref(),
        Kind::Video => raw.video.as_ref(),
        Kind::Audio => raw.audio.as_ref(),
        Kind::UnknownMedia => raw.other_media.as_ref(),
        Kind::Text | Kind::UrlText | Kind::Ignored => None,
    }?;
    Some(MediaRef::from_attachment(attachment))
}

impl MediaRef {
    fn from_attachment(attachment: &MediaAttachment) -> Self {
        let file_name = non_blank(attachment.file_name.as_deref());
        let caption = non_blank(attachment.caption.as_deref());
        Self {
            handle: attachment.handle.clone(),
            filename: file_name.or(caption).map_or_else(
                || placeholder_file_name(attachment.mime_type.as_deref()),
                str::to_string,
            ),
            caption: caption.or(file_name).map(str::to_string),
            mime_type: attachment.mime_type.clone(),
        }
    }
}

/// Placeholder filename, with an extension when the MIME type is a common one.
pub fn placeholder_file_name(mime_type: Option<&str>) -> String {
    match mime_type.and_then(extension_for) {
        Some(ext) => format!("{PLACEHOLDER_NAME}.{ext}"),
        None => PLACEHOLDER_NAME.to_string(),
    }
}

fn extension_for(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    Some(match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/mp4" | "audio/aac" => "m4a",
        "application/pdf" => "pdf",
        _ => return None,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
