//! Channel seams for courier.
//!
//! The relay core only sees the types in this crate: inbound events and the
//! media fetch capability on the source side, and the send operations on the
//! destination side. Platform adapters implement these traits.

pub mod error;
pub mod identity;
pub mod inbound;
pub mod outbound;

pub use {
    error::{Error, Result},
    identity::Identity,
    inbound::{
        ExtendedText, InboundEvent, InboundEventSink, MediaAttachment, MediaHandle, MediaSource,
        MessageEvent, RawKind, RawMessage,
    },
    outbound::{DestinationOutbound, OutboundFile},
};
