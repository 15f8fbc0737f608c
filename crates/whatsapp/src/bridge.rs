//! The WhatsApp source: sidecar lifecycle, login, and event delivery.

use std::{
    path::PathBuf,
    sync::{Arc, RwLock as StdRwLock},
};

use {
    anyhow::Result,
    async_trait::async_trait,
    courier_channels::{
        Error as ChannelError, InboundEvent, InboundEventSink, MediaHandle, MediaSource,
    },
    tokio::sync::{Mutex, RwLock, oneshot},
    tracing::{debug, info, warn},
};

use crate::{
    config::WhatsAppConfig,
    convert::{InboundFrame, message_event},
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir, start_sidecar},
    sidecar::{MessageCallback, SidecarHandle, connect_with_retry},
    types::{ConnectionState, GatewayMessage, SidecarMessage},
};

/// Connection attempts while a freshly spawned sidecar boots.
const DEFAULT_CONNECT_ATTEMPTS: u32 = 20;

type SharedSidecar = Arc<RwLock<Option<SidecarHandle>>>;
type SharedState = Arc<StdRwLock<ConnectionState>>;

/// WhatsApp Web source backed by the Baileys sidecar.
pub struct WhatsAppBridge {
    config: WhatsAppConfig,
    auth_dir: Option<PathBuf>,
    connect_attempts: u32,
    sidecar: SharedSidecar,
    process: Mutex<Option<SidecarProcess>>,
    state: SharedState,
    closed: Mutex<Option<oneshot::Receiver<()>>>,
}

impl WhatsAppBridge {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            auth_dir: config.auth_dir.clone(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            config,
            sidecar: Arc::new(RwLock::new(None)),
            process: Mutex::new(None),
            state: Arc::new(StdRwLock::new(ConnectionState::Disconnected)),
            closed: Mutex::new(None),
        }
    }

    /// Session directory to use when the config leaves `auth_dir` unset.
    pub fn with_default_auth_dir(mut self, dir: PathBuf) -> Self {
        if self.auth_dir.is_none() {
            self.auth_dir = Some(dir);
        }
        self
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    pub fn account_id(&self) -> &str {
        &self.config.account_id
    }

    /// Media downloads through this bridge's sidecar connection.
    pub fn media_source(&self) -> Arc<dyn MediaSource> {
        Arc::new(WhatsAppMedia {
            sidecar: Arc::clone(&self.sidecar),
            account_id: self.config.account_id.clone(),
        })
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The pairing code, while waiting for a scan.
    pub fn qr_code(&self) -> Option<String> {
        match self.connection_state() {
            ConnectionState::QrReceived(qr) => Some(qr),
            _ => None,
        }
    }

    /// Start the sidecar if configured to, connect, and log in. Events are
    /// delivered to `sink`, each on its own task.
    pub async fn start(&self, sink: Arc<dyn InboundEventSink>) -> Result<()> {
        let account_id = self.config.account_id.clone();
        info!(account_id, "starting WhatsApp source");

        if self.config.auto_start_sidecar {
            self.ensure_sidecar_process_running().await?;
        }

        let context = Arc::new(EventContext {
            account_id: account_id.clone(),
            state: Arc::clone(&self.state),
            sink,
        });
        let callback: MessageCallback = Arc::new(move |msg| handle_sidecar_message(msg, &context));

        let (handle, closed) =
            connect_with_retry(self.config.sidecar_port, callback, self.connect_attempts).await?;
        // Set before the login goes out: the reply may be handled before
        // `send` returns.
        set_state(&self.state, ConnectionState::WaitingForQr);
        if let Err(e) = handle.send(&GatewayMessage::Login {
            account_id,
            auth_dir: self.auth_dir.clone(),
        }) {
            set_state(&self.state, ConnectionState::Disconnected);
            return Err(e.into());
        }

        *self.sidecar.write().await = Some(handle);
        *self.closed.lock().await = Some(closed);
        Ok(())
    }

    async fn ensure_sidecar_process_running(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        if let Some(proc) = process.as_mut() {
            if proc.is_running() {
                return Ok(());
            }
            warn!("sidecar process died, restarting");
        }

        let sidecar_dir = find_sidecar_dir(self.config.sidecar_dir.as_deref())?;
        let proc = start_sidecar(SidecarConfig {
            sidecar_dir,
            port: self.config.sidecar_port,
            auth_dir: self.auth_dir.clone(),
        })
        .await?;
        *process = Some(proc);
        Ok(())
    }

    /// Resolves when the sidecar connection is lost. Pending forever if the
    /// bridge was never started.
    pub async fn closed(&self) {
        let receiver = self.closed.lock().await.take();
        match receiver {
            Some(rx) => {
                let _ = rx.await;
            },
            None => std::future::pending().await,
        }
    }

    /// Unlink this device from the WhatsApp account.
    pub async fn logout(&self) -> Result<()> {
        let sidecar = self.sidecar.read().await;
        let Some(handle) = sidecar.as_ref() else {
            anyhow::bail!("WhatsApp sidecar not connected");
        };
        handle.send(&GatewayMessage::Logout {
            account_id: self.config.account_id.clone(),
        })?;
        Ok(())
    }

    /// Drop the connection and stop the sidecar process if this bridge
    /// started it. The paired session is kept.
    pub async fn stop(&self) -> Result<()> {
        self.sidecar.write().await.take();
        set_state(&self.state, ConnectionState::Disconnected);

        let mut process = self.process.lock().await;
        if let Some(proc) = process.as_mut() {
            proc.stop().await?;
        }
        *process = None;
        Ok(())
    }
}

struct WhatsAppMedia {
    sidecar: SharedSidecar,
    account_id: String,
}

#[async_trait]
impl MediaSource for WhatsAppMedia {
    async fn download(&self, handle: &MediaHandle) -> courier_channels::Result<Vec<u8>> {
        let sidecar = self
            .sidecar
            .read()
            .await
            .clone()
            .ok_or_else(|| ChannelError::unavailable("WhatsApp sidecar not connected"))?;
        sidecar.download_media(&self.account_id, handle.as_str()).await
    }
}

struct EventContext {
    account_id: String,
    state: SharedState,
    sink: Arc<dyn InboundEventSink>,
}

impl EventContext {
    fn emit(&self, event: InboundEvent) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            sink.on_event(event).await;
        });
    }

    fn is_ours(&self, account_id: &str) -> bool {
        if account_id == self.account_id {
            return true;
        }
        debug!(account_id, "ignoring frame for another account");
        false
    }
}

fn set_state(state: &SharedState, next: ConnectionState) {
    *state.write().unwrap_or_else(|e| e.into_inner()) = next;
}

fn handle_sidecar_message(msg: SidecarMessage, ctx: &EventContext) {
    match msg {
        SidecarMessage::Qr { account_id, qr } => {
            if !ctx.is_ours(&account_id) {
                return;
            }
            info!(
                account_id,
                qr,
                "WhatsApp pairing required: render this code as a QR code and scan it from \
                 WhatsApp > Linked devices"
            );
            set_state(&ctx.state, ConnectionState::QrReceived(qr));
        },
        SidecarMessage::Connected {
            account_id,
            phone_number,
        } => {
            if !ctx.is_ours(&account_id) {
                return;
            }
            info!(account_id, ?phone_number, "whatsapp web connected");
            set_state(&ctx.state, ConnectionState::Connected {
                phone_number: phone_number.clone(),
            });
            ctx.emit(InboundEvent::Connected { phone_number });
        },
        SidecarMessage::Disconnected { account_id, reason } => {
            if !ctx.is_ours(&account_id) {
                return;
            }
            warn!(account_id, reason, "whatsapp web disconnected");
            set_state(&ctx.state, ConnectionState::Disconnected);
            ctx.emit(InboundEvent::Disconnected { reason });
        },
        SidecarMessage::LoggedOut { account_id } => {
            if !ctx.is_ours(&account_id) {
                return;
            }
            warn!(account_id, "whatsapp web logged out, pairing needed again");
            set_state(&ctx.state, ConnectionState::Disconnected);
            ctx.emit(InboundEvent::Disconnected {
                reason: "logged out".into(),
            });
        },
        SidecarMessage::InboundMessage {
            account_id,
            message_id,
            chat_jid,
            sender_jid,
            sender_name,
            message_type,
            message,
            timestamp,
        } => {
            if !ctx.is_ours(&account_id) {
                return;
            }
            debug!(
                account_id,
                message_id,
                sender_jid,
                message_type,
                ?timestamp,
                "received inbound message"
            );
            let event = message_event(&InboundFrame {
                message_id: &message_id,
                chat_jid: &chat_jid,
                sender_jid: &sender_jid,
                sender_name: sender_name.as_deref(),
                message_type: &message_type,
                message: &message,
            });
            ctx.emit(InboundEvent::Message(event));
        },
        SidecarMessage::MediaDownloaded { request_id, .. }
        | SidecarMessage::MediaDownloadFailed { request_id, .. } => {
            debug!(request_id, "stray media download response");
        },
        SidecarMessage::Error { account_id, error } => {
            warn!(?account_id, error, "sidecar error");
        },
    }
}
