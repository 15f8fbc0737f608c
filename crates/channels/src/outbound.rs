//! Outbound side: what the relay needs from the destination platform.

use async_trait::async_trait;

use crate::Result;

/// An in-memory file ready to upload.
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl OutboundFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for OutboundFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Send messages into a destination chat. Each call is a single attempt.
#[async_trait]
pub trait DestinationOutbound: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn send_photo(&self, chat_id: i64, file: OutboundFile, caption: Option<&str>)
    -> Result<()>;

    async fn send_document(
        &self,
        chat_id: i64,
        file: OutboundFile,
        caption: Option<&str>,
    ) -> Result<()>;

    async fn send_video(&self, chat_id: i64, file: OutboundFile, caption: Option<&str>)
    -> Result<()>;
}
