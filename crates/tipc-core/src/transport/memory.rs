//! In-process transport pair.

use super::{FrameReceiver, FrameSender, RawMessage};
use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sending half of an in-memory transport. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MemorySender(mpsc::UnboundedSender<RawMessage>);

/// Receiving half of an in-memory transport.
#[derive(Debug)]
pub struct MemoryReceiver(mpsc::UnboundedReceiver<RawMessage>);

/// One end of an in-memory duplex link.
#[derive(Debug)]
pub struct MemoryEndpoint {
    pub sender: MemorySender,
    pub receiver: MemoryReceiver,
}

impl MemoryEndpoint {
    #[must_use]
    pub fn into_parts(self) -> (MemorySender, MemoryReceiver) {
        (self.sender, self.receiver)
    }
}

/// Create two connected endpoints: what one sends, the other receives.
#[must_use]
pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (
        MemoryEndpoint {
            sender: MemorySender(a_tx),
            receiver: MemoryReceiver(a_rx),
        },
        MemoryEndpoint {
            sender: MemorySender(b_tx),
            receiver: MemoryReceiver(b_rx),
        },
    )
}

#[async_trait]
impl FrameSender for MemorySender {
    async fn send(&self, message: RawMessage) -> Result<(), TransportError> {
        self.0.send(message).map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl FrameReceiver for MemoryReceiver {
    async fn receive(&mut self) -> Result<RawMessage, TransportError> {
        self.0.recv().await.ok_or(TransportError::Closed)
    }
}
