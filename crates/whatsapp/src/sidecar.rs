//! WebSocket link to the sidecar.
//!
//! One background task owns the socket: it writes queued frames, answers
//! pings, resolves pending media downloads, and hands every other frame to
//! the [`MessageCallback`].

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    anyhow::{Context, Result},
    base64::Engine,
    futures::{SinkExt, StreamExt},
    tokio::sync::{mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use courier_channels::Error as ChannelError;

use crate::types::{GatewayMessage, SidecarMessage};

/// Default port of the sidecar's WebSocket server.
pub const DEFAULT_SIDECAR_PORT: u16 = 9876;

/// Upper bound on one download round-trip, independent of the caller's own.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Delay between connection attempts.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Receives every frame that is not a download response.
pub type MessageCallback = Arc<dyn Fn(SidecarMessage) + Send + Sync>;

type DownloadResult = courier_channels::Result<Vec<u8>>;
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<DownloadResult>>>>;

/// Handle to a live sidecar connection. Cheap to clone.
#[derive(Clone)]
pub struct SidecarHandle {
    write_tx: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
    pending: PendingMap,
}

impl SidecarHandle {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queue a frame for the sidecar.
    pub fn send(&self, message: &GatewayMessage) -> courier_channels::Result<()> {
        let json = serde_json::to_string(message)?;
        self.write_tx
            .send(json)
            .map_err(|_| ChannelError::unavailable("sidecar connection closed"))
    }

    /// Ask the sidecar to download the media of `message_id` and wait for it.
    pub async fn download_media(&self, account_id: &str, message_id: &str) -> DownloadResult {
        if !self.is_connected() {
            return Err(ChannelError::unavailable("sidecar not connected"));
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request_id.clone(), tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id: &request_id,
        };

        self.send(&GatewayMessage::DownloadMedia {
            request_id: request_id.clone(),
            account_id: account_id.to_string(),
            message_id: message_id.to_string(),
        })?;
        debug!(request_id, message_id, "media download requested");

        match tokio::time::timeout(DOWNLOAD_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ChannelError::unavailable(
                "sidecar connection closed during media download",
            )),
            Err(_) => Err(ChannelError::timeout("media download", DOWNLOAD_TIMEOUT)),
        }
    }
}

/// Removes a pending entry when the download future ends or is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(self.request_id);
    }
}

fn lock(
    pending: &PendingMap,
) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<DownloadResult>>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Connect to the sidecar on `127.0.0.1:port`.
///
/// Returns the handle and a receiver that fires once the connection is gone.
pub async fn connect(
    port: u16,
    callback: MessageCallback,
) -> Result<(SidecarHandle, oneshot::Receiver<()>)> {
    let url = format!("ws://127.0.0.1:{port}");
    let (ws_stream, _response) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to WhatsApp sidecar at {url}"))?;
    info!(url, "connected to WhatsApp sidecar");

    let (write_tx, write_rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = oneshot::channel();
    let handle = SidecarHandle {
        write_tx,
        connected: Arc::new(AtomicBool::new(true)),
        pending: Arc::new(Mutex::new(HashMap::new())),
    };

    let connected = Arc::clone(&handle.connected);
    let pending = Arc::clone(&handle.pending);
    tokio::spawn(async move {
        if let Err(e) = run_connection(ws_stream, write_rx, &pending, &callback).await {
            warn!(error = %e, "WhatsApp sidecar connection error");
        }
        connected.store(false, Ordering::Release);
        // Dropping the senders fails every waiting download.
        lock(&pending).clear();
        info!("WhatsApp sidecar connection closed");
        let _ = closed_tx.send(());
    });

    Ok((handle, closed_rx))
}

/// Connect, retrying while the sidecar process is still starting up.
pub async fn connect_with_retry(
    port: u16,
    callback: MessageCallback,
    max_attempts: u32,
) -> Result<(SidecarHandle, oneshot::Receiver<()>)> {
    let mut attempt = 1;
    loop {
        match connect(port, Arc::clone(&callback)).await {
            Ok(connection) => return Ok(connection),
            Err(e) if attempt < max_attempts => {
                debug!(attempt, max_attempts, error = %e, "sidecar not ready, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                attempt += 1;
            },
            Err(e) => {
                return Err(e.context(format!("gave up after {max_attempts} attempts")));
            },
        }
    }
}

async fn run_connection<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    mut write_rx: mpsc::UnboundedReceiver<String>,
    pending: &PendingMap,
    callback: &MessageCallback,
) -> Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut ws_sink, mut ws_reader) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_reader.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => route_frame(text.as_str(), pending, callback),
                    Some(Ok(Message::Ping(data))) => ws_sink.send(Message::Pong(data)).await?,
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {},
                    Some(Err(e)) => return Err(e.into()),
                }
            },
            outgoing = write_rx.recv() => {
                let Some(json) = outgoing else {
                    // Every handle was dropped.
                    let _ = ws_sink.send(Message::Close(None)).await;
                    return Ok(());
                };
                ws_sink.send(Message::Text(json.into())).await?;
            },
        }
    }
}

fn route_frame(text: &str, pending: &PendingMap, callback: &MessageCallback) {
    let message = match serde_json::from_str::<SidecarMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "unrecognised frame from WhatsApp sidecar");
            return;
        },
    };

    match message {
        SidecarMessage::MediaDownloaded { request_id, data } => {
            let result = base64::engine::general_purpose::STANDARD
                .decode(data.as_bytes())
                .map_err(ChannelError::from);
            resolve(pending, &request_id, result);
        },
        SidecarMessage::MediaDownloadFailed { request_id, error } => {
            let result = Err(ChannelError::unavailable(format!(
                "sidecar could not download media: {error}"
            )));
            resolve(pending, &request_id, result);
        },
        other => callback(other),
    }
}

fn resolve(pending: &PendingMap, request_id: &str, result: DownloadResult) {
    match lock(pending).remove(request_id) {
        // The caller may have given up already.
        Some(tx) => {
            let _ = tx.send(result);
        },
        None => debug!(request_id, "download response without a waiting request"),
    }
}
