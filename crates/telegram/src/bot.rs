use std::time::Duration;

use {
    secrecy::ExposeSecret,
    teloxide::{prelude::*, types::Me},
    tracing::info,
};

use crate::{
    config::TelegramConfig,
    error::{Error, Result},
    outbound::TelegramOutbound,
};

/// Build a bot client from config without touching the network.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    if !config.has_token() {
        return Err(Error::message("telegram bot token is not configured"));
    }

    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    match config.api_url.as_deref() {
        Some(url) => {
            let parsed = reqwest::Url::parse(url).map_err(|e| Error::InvalidApiUrl {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            Ok(bot.set_api_url(parsed))
        },
        None => Ok(bot),
    }
}

/// Build the bot and verify its credentials with `getMe`.
pub async fn connect(config: &TelegramConfig) -> Result<(TelegramOutbound, Me)> {
    let bot = build_bot(config)?;
    let me = bot.get_me().await?;
    info!(
        username = ?me.user.username,
        bot_id = me.user.id.0,
        "telegram bot connected"
    );
    Ok((TelegramOutbound::new(bot), me))
}
