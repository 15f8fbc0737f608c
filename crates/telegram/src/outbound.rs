use {
    async_trait::async_trait,
    teloxide::{
        RequestError,
        prelude::*,
        types::{ChatId, InputFile},
    },
    tracing::{debug, info},
};

use courier_channels::{DestinationOutbound, Error as ChannelError, OutboundFile, Result};

/// Telegram caption size limit for media messages, in characters.
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;

/// Sends relayed messages through one bot. Each call is one Bot API request.
#[derive(Clone, Debug)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

/// Cut a caption down to what Telegram accepts, on a char boundary.
fn truncate_caption(caption: &str) -> &str {
    match caption.char_indices().nth(TELEGRAM_CAPTION_LIMIT) {
        Some((idx, _)) => &caption[..idx],
        None => caption,
    }
}

fn send_error(operation: &'static str, err: RequestError) -> ChannelError {
    ChannelError::external(format!("telegram {operation}"), err)
}

#[async_trait]
impl DestinationOutbound for TelegramOutbound {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        debug!(chat_id, len = text.len(), "telegram outbound text send start");
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| send_error("sendMessage", e))?;
        info!(chat_id, len = text.len(), "telegram outbound text sent");
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file: OutboundFile,
        caption: Option<&str>,
    ) -> Result<()> {
        let size = file.bytes.len();
        let mut req = self.bot.send_photo(
            ChatId(chat_id),
            InputFile::memory(file.bytes).file_name(file.name),
        );
        if let Some(caption) = caption {
            req = req.caption(truncate_caption(caption));
        }
        req.await.map_err(|e| send_error("sendPhoto", e))?;
        info!(chat_id, size, "telegram outbound media sent as photo");
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file: OutboundFile,
        caption: Option<&str>,
    ) -> Result<()> {
        let size = file.bytes.len();
        let mut req = self.bot.send_document(
            ChatId(chat_id),
            InputFile::memory(file.bytes).file_name(file.name),
        );
        if let Some(caption) = caption {
            req = req.caption(truncate_caption(caption));
        }
        req.await.map_err(|e| send_error("sendDocument", e))?;
        info!(chat_id, size, "telegram outbound media sent as document");
        Ok(())
    }

    async fn send_video(
        &self,
        chat_id: i64,
        file: OutboundFile,
        caption: Option<&str>,
    ) -> Result<()> {
        let size = file.bytes.len();
        let mut req = self.bot.send_video(
            ChatId(chat_id),
            InputFile::memory(file.bytes).file_name(file.name),
        );
        if let Some(caption) = caption {
            req = req.caption(truncate_caption(caption));
        }
        req.await.map_err(|e| send_error("sendVideo", e))?;
        info!(chat_id, size, "telegram outbound media sent as video");
        Ok(())
    }
}
