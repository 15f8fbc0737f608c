//! The relay controller: one inbound event in, at most one destination call
//! out.
//!
//! ```text
//! Received -> Authorized? -> Classified -> (MediaFetched) -> Dispatched
//!                 |               |              |
//!                 +---------------+--------------+--------> Dropped
//! ```
//!
//! Settings are read from the [`SettingsProvider`] on every event, so a
//! changed authorized sender or destination takes effect on the next message.
//! Nothing is retried: a failed download drops the event and a failed send
//! is logged and forgotten.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    courier_channels::{
        DestinationOutbound, InboundEvent, InboundEventSink, MediaSource, MessageEvent,
    },
    tracing::{debug, info, warn},
};

use crate::{
    access::{AccessDenied, check_sender},
    classify::{Kind, classify_content},
    dispatch::{ClassifiedMessage, DestinationTarget, Dispatcher},
    error::{Error, Result},
    settings::SettingsProvider,
};

/// Why an event produced no destination call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Connection state change, not a chat message.
    NotAMessage,
    Unauthorized(AccessDenied),
    /// Nothing relayable in the message.
    Ignored,
    NoDestination,
    InvalidDestination,
    DownloadFailed,
}

/// Terminal state of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// One send was attempted; `delivered` is whether it succeeded.
    Dispatched { kind: Kind, delivered: bool },
    Dropped(DropReason),
}

/// Runs each inbound event through the relay pipeline. Shared across event
/// tasks; holds no per-event state.
pub struct RelayController {
    settings: Arc<dyn SettingsProvider>,
    source: Arc<dyn MediaSource>,
    dispatcher: Dispatcher,
}

impl RelayController {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        source: Arc<dyn MediaSource>,
        outbound: Arc<dyn DestinationOutbound>,
    ) -> Self {
        Self {
            settings,
            source,
            dispatcher: Dispatcher::new(outbound),
        }
    }

    /// Run one event through the pipeline.
    pub async fn handle(&self, event: InboundEvent) -> RelayOutcome {
        match event {
            InboundEvent::Message(message) => self.relay(&message).await,
            InboundEvent::Connected { .. } | InboundEvent::Disconnected { .. } => {
                RelayOutcome::Dropped(DropReason::NotAMessage)
            },
        }
    }

    async fn relay(&self, message: &MessageEvent) -> RelayOutcome {
        let settings = self.settings.relay_settings();

        if let Err(reason) = check_sender(&message.sender, settings.authorized_sender.as_deref()) {
            debug!(sender = %message.sender, %reason, "dropping message");
            return RelayOutcome::Dropped(DropReason::Unauthorized(reason));
        }

        let kind = classify_content(&message.payload);
        if kind == Kind::Ignored {
            info!(
                message_id = %message.message_id,
                message_type = ?message.message_type,
                "ignoring message without relayable content"
            );
            return RelayOutcome::Dropped(DropReason::Ignored);
        }

        let target = match settings.destination_chat_id.as_deref().map(DestinationTarget::parse) {
            Some(Ok(target)) => target,
            Some(Err(e)) => {
                warn!(message_id = %message.message_id, error = %e, "dropping message");
                return RelayOutcome::Dropped(DropReason::InvalidDestination);
            },
            None => {
                warn!(
                    message_id = %message.message_id,
                    "dropping message: no destination chat configured"
                );
                return RelayOutcome::Dropped(DropReason::NoDestination);
            },
        };

        let classified = ClassifiedMessage::new(&message.payload, kind);

        let bytes = match &classified.media {
            Some(media) => {
                let after = timeout_secs(settings.download_timeout_secs);
                let download = async { self.source.download(&media.handle).await.map_err(Error::from) };
                match with_timeout("media download", after, download).await {
                    Ok(bytes) => {
                        debug!(
                            message_id = %message.message_id,
                            %kind,
                            size = bytes.len(),
                            "media downloaded"
                        );
                        Some(bytes)
                    },
                    Err(e) => {
                        warn!(
                            message_id = %message.message_id,
                            %kind,
                            error = %e,
                            "media download failed, dropping message"
                        );
                        return RelayOutcome::Dropped(DropReason::DownloadFailed);
                    },
                }
            },
            None => None,
        };

        let after = timeout_secs(settings.send_timeout_secs);
        let send = self.dispatcher.dispatch(target, &classified, bytes);
        let delivered = match with_timeout("send", after, send).await {
            Ok(()) => {
                info!(
                    message_id = %message.message_id,
                    chat_id = target.chat_id,
                    %kind,
                    "message relayed"
                );
                true
            },
            Err(e) => {
                warn!(
                    message_id = %message.message_id,
                    chat_id = target.chat_id,
                    %kind,
                    error = %e,
                    "relay send failed"
                );
                false
            },
        };
        RelayOutcome::Dispatched { kind, delivered }
    }
}

#[async_trait]
impl InboundEventSink for RelayController {
    async fn on_event(&self, event: InboundEvent) {
        self.handle(event).await;
    }
}

fn timeout_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

async fn with_timeout<T>(
    operation: &'static str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Error::timeout(operation, after))?
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{Call, FakeSource, RecordingOutbound},
        courier_channels::{
            Identity, MediaAttachment, MediaHandle, RawKind, RawMessage,
        },
        courier_config::RelayConfig,
    };

    const SENDER: &str = "15551234567";

    fn settings() -> RelayConfig {
        RelayConfig {
            authorized_sender: Some(SENDER.into()),
            destination_chat_id: Some("-100".into()),
            ..Default::default()
        }
    }

    fn message(id: &str, from: &str, payload: RawMessage) -> InboundEvent {
        InboundEvent::Message(MessageEvent {
            message_id: id.into(),
            chat: format!("{from}@s.whatsapp.net"),
            sender: Identity::parse(&format!("{from}:2@s.whatsapp.net")),
            sender_name: Some("Sensei".into()),
            message_type: RawKind::Media,
            payload,
        })
    }

    fn text(body: &str) -> RawMessage {
        RawMessage {
            conversation: Some(body.into()),
            ..Default::default()
        }
    }

    fn media(handle: &str, caption: Option<&str>) -> Option<MediaAttachment> {
        Some(MediaAttachment {
            caption: caption.map(Into::into),
            ..MediaAttachment::new(MediaHandle::new(handle))
        })
    }

    struct Harness {
        controller: RelayController,
        source: Arc<FakeSource>,
        outbound: Arc<RecordingOutbound>,
    }

    fn harness(settings: RelayConfig, source: FakeSource, outbound: RecordingOutbound) -> Harness {
        let source = Arc::new(source);
        let outbound = Arc::new(outbound);
        Harness {
            controller: RelayController::new(Arc::new(settings), source.clone(), outbound.clone()),
            source,
            outbound,
        }
    }

    fn default_harness() -> Harness {
        harness(
            settings(),
            FakeSource::default().with("img", b"png-bytes"),
            RecordingOutbound::default(),
        )
    }

    #[tokio::test]
    async fn unauthorized_sender_never_dispatches() {
        let h = default_harness();
        let payload = RawMessage {
            image: media("img", Some("cat.png")),
            ..text("hi")
        };
        let outcome = h.controller.handle(message("1", "15550000000", payload)).await;
        assert_eq!(
            outcome,
            RelayOutcome::Dropped(DropReason::Unauthorized(AccessDenied::NotAuthorized))
        );
        assert!(h.outbound.calls().is_empty());
        assert!(h.source.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_authorized_sender_drops_everything() {
        let h = harness(
            RelayConfig {
                authorized_sender: None,
                ..settings()
            },
            FakeSource::default(),
            RecordingOutbound::default(),
        );
        let outcome = h.controller.handle(message("1", SENDER, text("hi"))).await;
        assert_eq!(
            outcome,
            RelayOutcome::Dropped(DropReason::Unauthorized(AccessDenied::NoAuthorizedSender))
        );
        assert!(h.outbound.calls().is_empty());
    }

    #[tokio::test]
    async fn authorized_text_is_relayed_verbatim() {
        let h = default_harness();
        let body = "Lesson 4: ownership & borrowing 🦀";
        let outcome = h.controller.handle(message("1", SENDER, text(body))).await;
        assert_eq!(outcome, RelayOutcome::Dispatched {
            kind: Kind::Text,
            delivered: true
        });
        assert_eq!(h.outbound.calls(), vec![Call::Text {
            chat_id: -100,
            text: body.into()
        }]);
    }

    #[tokio::test]
    async fn image_caption_is_forwarded() {
        let h = default_harness();
        let payload = RawMessage {
            image: media("img", Some("cat.png")),
            ..Default::default()
        };
        let outcome = h.controller.handle(message("1", SENDER, payload)).await;
        assert_eq!(outcome, RelayOutcome::Dispatched {
            kind: Kind::Image,
            delivered: true
        });
        assert_eq!(h.source.requests(), vec!["img".to_string()]);
        assert_eq!(h.outbound.calls(), vec![Call::Photo {
            chat_id: -100,
            name: "cat.png".into(),
            len: 9,
            caption: Some("cat.png".into()),
        }]);
    }

    #[tokio::test]
    async fn document_without_filename_is_named_after_caption() {
        let h = harness(
            settings(),
            FakeSource::default().with("doc", b"%PDF"),
            RecordingOutbound::default(),
        );
        let payload = RawMessage {
            document: media("doc", Some("report")),
            ..Default::default()
        };
        h.controller.handle(message("1", SENDER, payload)).await;
        assert_eq!(h.outbound.calls(), vec![Call::Document {
            chat_id: -100,
            name: "report".into(),
            len: 4,
            caption: Some("report".into()),
        }]);
    }

    #[tokio::test]
    async fn unknown_media_goes_out_as_placeholder_document() {
        let h = harness(
            settings(),
            FakeSource::default().with("sticker", b"webp"),
            RecordingOutbound::default(),
        );
        let payload = RawMessage {
            other_media: media("sticker", None),
            ..Default::default()
        };
        let outcome = h.controller.handle(message("1", SENDER, payload)).await;
        assert_eq!(outcome, RelayOutcome::Dispatched {
            kind: Kind::UnknownMedia,
            delivered: true
        });
        assert_eq!(h.outbound.calls(), vec![Call::Document {
            chat_id: -100,
            name: "attachment".into(),
            len: 4,
            caption: Some("attachment".into()),
        }]);
    }

    #[tokio::test]
    async fn download_failure_drops_and_controller_keeps_working() {
        let h = default_harness();
        let payload = RawMessage {
            video: media("missing", None),
            ..Default::default()
        };
        let outcome = h.controller.handle(message("1", SENDER, payload)).await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::DownloadFailed));
        assert!(h.outbound.calls().is_empty());

        let outcome = h.controller.handle(message("2", SENDER, text("next"))).await;
        assert_eq!(outcome, RelayOutcome::Dispatched {
            kind: Kind::Text,
            delivered: true
        });
        assert_eq!(h.outbound.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_download_times_out() {
        let h = harness(
            RelayConfig {
                download_timeout_secs: 5,
                ..settings()
            },
            FakeSource::default()
                .with("img", b"x")
                .slow(Duration::from_secs(30)),
            RecordingOutbound::default(),
        );
        let payload = RawMessage {
            image: media("img", None),
            ..Default::default()
        };
        let outcome = h.controller.handle(message("1", SENDER, payload)).await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::DownloadFailed));
        assert!(h.outbound.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_send_times_out_after_one_attempt() {
        let h = harness(
            RelayConfig {
                send_timeout_secs: 5,
                ..settings()
            },
            FakeSource::default(),
            RecordingOutbound::slow(Duration::from_secs(30)),
        );
        let outcome = h.controller.handle(message("1", SENDER, text("hi"))).await;
        assert_eq!(outcome, RelayOutcome::Dispatched {
            kind: Kind::Text,
            delivered: false
        });
        assert_eq!(h.outbound.calls().len(), 1);
    }

    #[tokio::test]
    async fn send_failure_is_not_retried() {
        let h = harness(settings(), FakeSource::default(), RecordingOutbound::failing());
        let outcome = h.controller.handle(message("1", SENDER, text("hi"))).await;
        assert_eq!(outcome, RelayOutcome::Dispatched {
            kind: Kind::Text,
            delivered: false
        });
        assert_eq!(h.outbound.calls().len(), 1);
    }

    #[tokio::test]
    async fn invalid_destination_drops_for_this_event_only() {
        let h = harness(
            RelayConfig {
                destination_chat_id: Some("my-group".into()),
                ..settings()
            },
            FakeSource::default(),
            RecordingOutbound::default(),
        );
        let outcome = h.controller.handle(message("1", SENDER, text("hi"))).await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::InvalidDestination));
        assert!(h.outbound.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_destination_drops() {
        let h = harness(
            RelayConfig {
                destination_chat_id: None,
                ..settings()
            },
            FakeSource::default(),
            RecordingOutbound::default(),
        );
        let outcome = h.controller.handle(message("1", SENDER, text("hi"))).await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::NoDestination));
    }

    #[tokio::test]
    async fn empty_message_is_ignored() {
        let h = default_harness();
        let outcome = h
            .controller
            .handle(message("1", SENDER, RawMessage::default()))
            .await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::Ignored));
        assert!(h.source.requests().is_empty());
    }

    #[tokio::test]
    async fn connection_events_are_not_messages() {
        let h = default_harness();
        let outcome = h
            .controller
            .handle(InboundEvent::Connected { phone_number: None })
            .await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::NotAMessage));
    }

    #[tokio::test]
    async fn settings_are_read_per_event() {
        let live = Arc::new(
            courier_config::LiveRelayConfig::new(settings(), None).with_env_lookup(|_| None),
        );
        let outbound = Arc::new(RecordingOutbound::default());
        let controller = RelayController::new(
            live.clone(),
            Arc::new(FakeSource::default()),
            outbound.clone(),
        );

        controller.handle(message("1", SENDER, text("one"))).await;
        live.replace(RelayConfig {
            destination_chat_id: Some("-200".into()),
            ..settings()
        });
        controller.handle(message("2", SENDER, text("two"))).await;

        assert_eq!(outbound.calls(), vec![
            Call::Text {
                chat_id: -100,
                text: "one".into()
            },
            Call::Text {
                chat_id: -200,
                text: "two".into()
            },
        ]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_events_dispatch_once_each() {
        let h = harness(
            settings(),
            FakeSource::default()
                .with("img", b"image")
                .slow(Duration::from_millis(20)),
            RecordingOutbound::default(),
        );
        let controller = Arc::new(h.controller);

        let image = RawMessage {
            image: media("img", Some("photo caption")),
            ..Default::default()
        };
        let (a, b) = tokio::join!(
            {
                let c = controller.clone();
                tokio::spawn(async move { c.handle(message("1", SENDER, image)).await })
            },
            {
                let c = controller.clone();
                tokio::spawn(async move { c.handle(message("2", SENDER, text("plain text"))).await })
            },
        );
        assert_eq!(a.unwrap(), RelayOutcome::Dispatched {
            kind: Kind::Image,
            delivered: true
        });
        assert_eq!(b.unwrap(), RelayOutcome::Dispatched {
            kind: Kind::Text,
            delivered: true
        });

        let calls = h.outbound.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&Call::Text {
            chat_id: -100,
            text: "plain text".into()
        }));
        assert!(calls.contains(&Call::Photo {
            chat_id: -100,
            name: "photo caption".into(),
            len: 5,
            caption: Some("photo caption".into()),
        }));
    }

    #[tokio::test]
    async fn sink_entry_point_relays() {
        let h = default_harness();
        h.controller.on_event(message("1", SENDER, text("via sink"))).await;
        assert_eq!(h.outbound.calls().len(), 1);
    }
}
