//! # Channel
//!
//! One duplex transport plus the protocol state scoped to it: the wire codec
//! and the correlation table.
//!
//! ## Reader task
//!
//! ```text
//! FrameReceiver ──receive()──→ reader task ──settle()──→ CorrelationTable
//!                                   │
//!                                   └──fan out──→ Subscription (request handler, ...)
//! ```
//!
//! The reader is the only code that settles pending calls. It processes one
//! message at a time in arrival order and never waits on a subscriber.
//!
//! ## Teardown
//!
//! `close()`, the transport reporting `Closed`, or the last handle being
//! dropped stops the reader, fails every pending call with
//! `CallError::ChannelClosed` and ends all subscriptions.

use crate::codec::{CodecError, FrameRef, WireCodec};
use crate::config::{ChannelConfig, ConfigError};
use crate::correlation::{CorrelationTable, StatsSnapshot};
use crate::error::{CallError, TransportError};
use crate::transport::memory;
use crate::transport::{Detached, FrameReceiver, FrameSender, RawMessage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared state behind every `Channel` handle.
pub(crate) struct ChannelInner {
    pub(crate) config: ChannelConfig,
    pub(crate) codec: WireCodec,
    pub(crate) table: CorrelationTable,
    sender: Box<dyn FrameSender>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RawMessage>>>,
    closed: AtomicBool,
    /// Set while a request handler owns this channel.
    pub(crate) serving: AtomicBool,
    shutdown: CancellationToken,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    malformed: AtomicU64,
    calls_handled: AtomicU64,
    router_errors: AtomicU64,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Handle to one protocol channel. Cheap to clone.
#[derive(Clone)]
pub struct Channel {
    pub(crate) inner: Arc<ChannelInner>,
}

/// Traffic and correlation counters for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub malformed: u64,
    /// Inbound calls answered by this channel's request handler.
    pub calls_handled: u64,
    /// Inbound calls answered with an error outcome.
    pub router_errors: u64,
    pub pending: usize,
    pub correlation: StatsSnapshot,
}

impl Channel {
    /// Bind a channel to a transport and start its reader.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new<S, R>(sender: S, receiver: R, config: ChannelConfig) -> Result<Self, ConfigError>
    where
        S: FrameSender + 'static,
        R: FrameReceiver + 'static,
    {
        config.validate()?;

        let codec = WireCodec::new(&config.prefix, config.transformer.build());
        let inner = Arc::new(ChannelInner {
            table: CorrelationTable::new(config.name.clone()),
            codec,
            sender: Box::new(sender),
            subscribers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            serving: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            calls_handled: AtomicU64::new(0),
            router_errors: AtomicU64::new(0),
            config,
        });

        tokio::spawn(reader_loop(
            Arc::downgrade(&inner),
            inner.shutdown.clone(),
            Box::new(receiver),
        ));
        if let Some(interval) = inner.config.sweep_interval() {
            tokio::spawn(sweep_loop(
                Arc::downgrade(&inner),
                inner.shutdown.clone(),
                interval,
            ));
        }

        debug!(
            channel = %inner.config.name,
            transformer = inner.codec.transformer().name(),
            "Channel opened"
        );
        Ok(Self { inner })
    }

    /// Two channels connected back to back in memory.
    pub fn memory_pair(
        left: ChannelConfig,
        right: ChannelConfig,
    ) -> Result<(Self, Self), ConfigError> {
        let (a, b) = memory::pair();
        let (a_tx, a_rx) = a.into_parts();
        let (b_tx, b_rx) = b.into_parts();
        Ok((Self::new(a_tx, a_rx, left)?, Self::new(b_tx, b_rx, right)?))
    }

    /// A channel with no transport: every send fails with
    /// `TransportError::Unimplemented`.
    pub fn detached(config: ChannelConfig) -> Result<Self, ConfigError> {
        let transport = Detached::new(config.name.clone());
        Self::new(transport.clone(), transport, config)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn codec(&self) -> &WireCodec {
        &self.inner.codec
    }

    /// Receive every inbound message from now on, one at a time, in arrival order.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.is_closed() {
            self.inner.subscribers.lock().push(tx);
        }
        Subscription { receiver: rx }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Send a message as-is. Protocol traffic goes through `Client` and the
    /// request handler; this is for anything else sharing the transport.
    pub async fn send_raw(&self, message: RawMessage) -> Result<(), TransportError> {
        self.inner.send(message).await
    }

    /// Tear the channel down. Idempotent.
    pub fn close(&self) {
        self.inner.teardown("closed by owner");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Resolves once the channel has been torn down.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await;
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.table.pending_count()
    }

    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            frames_sent: self.inner.frames_sent.load(Ordering::Relaxed),
            frames_received: self.inner.frames_received.load(Ordering::Relaxed),
            malformed: self.inner.malformed.load(Ordering::Relaxed),
            calls_handled: self.inner.calls_handled.load(Ordering::Relaxed),
            router_errors: self.inner.router_errors.load(Ordering::Relaxed),
            pending: self.inner.table.pending_count(),
            correlation: self.inner.table.stats().snapshot(),
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.config.name)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl ChannelInner {
    pub(crate) async fn send(&self, message: RawMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        match self.sender.send(message).await {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                error!(channel = %self.config.name, error = %e, "Transport send failed");
                Err(e)
            }
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn record_malformed(&self, error: &CodecError) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        warn!(channel = %self.config.name, error = %error, "Dropping malformed frame");
    }

    pub(crate) fn record_handled(&self, is_error: bool) {
        self.calls_handled.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.router_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_message(&self, message: RawMessage) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);

        match self.codec.classify(&message) {
            Ok(FrameRef::Result { id, body }) => {
                if !self.table.is_pending(id) {
                    self.table.record_orphan(id);
                } else {
                    match self.codec.decode_result(id, body) {
                        Ok(outcome) => {
                            self.table.settle(id, outcome);
                        }
                        Err(e) => self.record_malformed(&e),
                    }
                }
            }
            // Call frames belong to the request handler's subscription.
            Ok(FrameRef::Call { .. }) => {}
            Err(CodecError::UnknownTag | CodecError::NotText) => {
                debug!(channel = %self.config.name, "Ignoring non-protocol message");
            }
            Err(e) => self.record_malformed(&e),
        }

        self.subscribers
            .lock()
            .retain(|tx| tx.send(message.clone()).is_ok());
    }

    fn teardown(&self, reason: &str) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        let failed = self.table.fail_all(&CallError::ChannelClosed);
        self.subscribers.lock().clear();
        info!(
            channel = %self.config.name,
            reason,
            failed_calls = failed,
            "Channel closed"
        );
    }
}

async fn reader_loop(
    inner: Weak<ChannelInner>,
    shutdown: CancellationToken,
    mut receiver: Box<dyn FrameReceiver>,
) {
    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = receiver.receive() => received,
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match received {
            Ok(message) => inner.on_message(message),
            Err(TransportError::Closed) => {
                inner.teardown("transport closed");
                break;
            }
            Err(e) => {
                error!(channel = %inner.config.name, error = %e, "Transport receive failed");
                inner.teardown("transport failed");
                break;
            }
        }
    }
}

async fn sweep_loop(
    inner: Weak<ChannelInner>,
    shutdown: CancellationToken,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let removed = inner.table.remove_expired();
        if removed > 0 {
            debug!(channel = %inner.config.name, removed, "Swept expired pending calls");
        }
    }
}

/// Inbound message stream for one subscriber.
///
/// Ends (`recv()` returns `None`) when the channel is torn down.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<RawMessage>,
}

impl Subscription {
    /// Next inbound message, or `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<RawMessage> {
        self.receiver.recv().await
    }

    /// Next inbound message if one is already queued.
    pub fn try_recv(&mut self) -> Option<RawMessage> {
        self.receiver.try_recv().ok()
    }
}
