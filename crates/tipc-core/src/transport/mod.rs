//! # Transports
//!
//! A transport is one raw duplex link that carries one opaque message per
//! delivery. It makes no framing, serialization or correlation guarantees;
//! the only contract is that a message sent on one end arrives at the other
//! end's receiver in send order.
//!
//! - [`memory`]: in-process pair over `tokio::sync::mpsc`
//! - [`lines`]: newline-delimited text over any `AsyncRead`/`AsyncWrite`
//! - [`Detached`]: a placeholder with no transport behind it

pub mod lines;
pub mod memory;

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::error;

/// One opaque message as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMessage {
    /// Text payload. Protocol frames are always text.
    Text(String),
    /// Binary payload. Never protocol traffic.
    Binary(Bytes),
}

impl RawMessage {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawMessage::Text(s) => Some(s),
            RawMessage::Binary(_) => None,
        }
    }
}

impl From<String> for RawMessage {
    fn from(s: String) -> Self {
        RawMessage::Text(s)
    }
}

impl From<&str> for RawMessage {
    fn from(s: &str) -> Self {
        RawMessage::Text(s.to_string())
    }
}

impl From<Bytes> for RawMessage {
    fn from(b: Bytes) -> Self {
        RawMessage::Binary(b)
    }
}

/// Sending half of a transport.
#[async_trait]
pub trait FrameSender: Send + Sync {
    /// Deliver one message to the peer.
    async fn send(&self, message: RawMessage) -> Result<(), TransportError>;
}

/// Receiving half of a transport.
#[async_trait]
pub trait FrameReceiver: Send {
    /// Next inbound message. `Err(TransportError::Closed)` ends the stream.
    async fn receive(&mut self) -> Result<RawMessage, TransportError>;
}

/// A channel end with no concrete transport.
///
/// Sending fails immediately with `TransportError::Unimplemented`; receiving
/// never yields.
#[derive(Debug, Clone)]
pub struct Detached {
    name: String,
}

impl Detached {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl FrameSender for Detached {
    async fn send(&self, _message: RawMessage) -> Result<(), TransportError> {
        error!(channel = %self.name, "send on a channel with no transport bound");
        Err(TransportError::Unimplemented(self.name.clone()))
    }
}

#[async_trait]
impl FrameReceiver for Detached {
    async fn receive(&mut self) -> Result<RawMessage, TransportError> {
        std::future::pending().await
    }
}
