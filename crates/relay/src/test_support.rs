//! Recording fakes for the channel traits.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use {
    async_trait::async_trait,
    courier_channels::{DestinationOutbound, Error, MediaHandle, MediaSource, OutboundFile, Result},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text {
        chat_id: i64,
        text: String,
    },
    Photo {
        chat_id: i64,
        name: String,
        len: usize,
        caption: Option<String>,
    },
    Document {
        chat_id: i64,
        name: String,
        len: usize,
        caption: Option<String>,
    },
    Video {
        chat_id: i64,
        name: String,
        len: usize,
        caption: Option<String>,
    },
}

#[derive(Default)]
pub struct RecordingOutbound {
    calls: Mutex<Vec<Call>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingOutbound {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::unavailable("destination rejected the message"));
        }
        Ok(())
    }
}

#[async_trait]
impl DestinationOutbound for RecordingOutbound {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.record(Call::Text {
            chat_id,
            text: text.to_string(),
        })
        .await
    }

    async fn send_photo(&self, chat_id: i64, file: OutboundFile, caption: Option<&str>) -> Result<()> {
        self.record(Call::Photo {
            chat_id,
            name: file.name,
            len: file.bytes.len(),
            caption: caption.map(Into::into),
        })
        .await
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file: OutboundFile,
        caption: Option<&str>,
    ) -> Result<()> {
        self.record(Call::Document {
            chat_id,
            name: file.name,
            len: file.bytes.len(),
            caption: caption.map(Into::into),
        })
        .await
    }

    async fn send_video(&self, chat_id: i64, file: OutboundFile, caption: Option<&str>) -> Result<()> {
        self.record(Call::Video {
            chat_id,
            name: file.name,
            len: file.bytes.len(),
            caption: caption.map(Into::into),
        })
        .await
    }
}

/// Serves fixed bytes per handle; unknown handles fail.
#[derive(Default)]
pub struct FakeSource {
    media: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with(mut self, handle: &str, bytes: &[u8]) -> Self {
        self.media.insert(handle.to_string(), bytes.to_vec());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MediaSource for FakeSource {
    async fn download(&self, handle: &MediaHandle) -> Result<Vec<u8>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle.as_str().to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.media
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| Error::unavailable(format!("no media for {}", handle.as_str())))
    }
}
