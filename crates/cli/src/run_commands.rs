use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, Result},
    courier_config::{LiveRelayConfig, RelayConfig},
    courier_relay::RelayController,
    courier_telegram::TelegramConfig,
    courier_whatsapp::{WhatsAppBridge, WhatsAppConfig},
    tracing::{info, warn},
};

/// Start both adapters and relay until interrupted or the WhatsApp link
/// drops.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let (config, source) = crate::load_config(config_path)?;
    let telegram: TelegramConfig = serde_json::from_value(config.channels.telegram_value())
        .context("invalid [channels.telegram] section")?;
    let whatsapp: WhatsAppConfig = serde_json::from_value(config.channels.whatsapp_value())
        .context("invalid [channels.whatsapp] section")?;

    let settings = Arc::new(LiveRelayConfig::new(config.relay, source));
    warn_if_incomplete(&settings.snapshot());

    let (outbound, me) = courier_telegram::connect(&telegram)
        .await
        .context("telegram bot credentials rejected")?;

    let mut bridge = WhatsAppBridge::new(whatsapp);
    if let Some(dir) = courier_config::data_dir() {
        bridge = bridge.with_default_auth_dir(dir.join("whatsapp"));
    }

    let controller = Arc::new(RelayController::new(
        Arc::<LiveRelayConfig>::clone(&settings),
        bridge.media_source(),
        Arc::new(outbound),
    ));
    bridge
        .start(controller)
        .await
        .context("failed to start the WhatsApp source")?;
    info!(bot = %me.username(), "relay running");

    let result = wait_for_shutdown(&bridge, &settings).await;
    if let Err(e) = bridge.stop().await {
        warn!(error = %e, "failed to stop WhatsApp source cleanly");
    }
    result
}

/// Missing relay settings are not fatal: they can arrive later through the
/// environment or a reload.
fn warn_if_incomplete(relay: &RelayConfig) {
    if relay.authorized_sender.is_none() {
        warn!("no authorized sender configured, nothing will be relayed");
    }
    if relay.destination_chat_id.is_none() {
        warn!("no destination chat configured, nothing will be relayed");
    }
}

#[cfg(unix)]
async fn wait_for_shutdown(bridge: &WhatsAppBridge, settings: &LiveRelayConfig) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let closed = bridge.closed();
    tokio::pin!(closed);

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("interrupt received, shutting down");
                return Ok(());
            },
            _ = terminate.recv() => {
                info!("terminate signal received, shutting down");
                return Ok(());
            },
            _ = hangup.recv() => reload(settings),
            () = &mut closed => anyhow::bail!("lost connection to the WhatsApp sidecar"),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(bridge: &WhatsAppBridge, _settings: &LiveRelayConfig) -> Result<()> {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("interrupt received, shutting down");
            Ok(())
        },
        () = bridge.closed() => anyhow::bail!("lost connection to the WhatsApp sidecar"),
    }
}

#[cfg(unix)]
fn reload(settings: &LiveRelayConfig) {
    match settings.reload() {
        Ok(true) => warn_if_incomplete(&settings.snapshot()),
        Ok(false) => info!("no config file to reload"),
        Err(e) => warn!(error = %e, "config reload failed, keeping previous settings"),
    }
}
