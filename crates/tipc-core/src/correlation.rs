//! # Correlation Table
//!
//! Maps correlation IDs to the settlement hooks of outstanding calls on one
//! channel.
//!
//! Flow:
//! 1. The client calls `register()` and gets an ID plus a oneshot receiver
//! 2. The client sends the call frame carrying that ID
//! 3. The channel reader decodes a result frame and calls `settle()`
//! 4. The client's `PendingReply` resolves from the receiver
//!
//! An entry is inserted exactly once and removed exactly once, by whichever of
//! settle, cancel, expiry or teardown happens first.

use crate::error::CallError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tipc_types::{CallId, CallKind, Outcome};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a pending call resolves to.
pub type Settlement = Result<Outcome, CallError>;

/// IDs stay representable as a non-negative `i64` on the wire.
const MAX_ID: u64 = i64::MAX as u64;

/// A call waiting for its result frame.
struct PendingCall {
    sender: oneshot::Sender<Settlement>,
    created_at: Instant,
    kind: CallKind,
    path: String,
    timeout: Option<Duration>,
}

/// Counters for one table.
#[derive(Debug, Default)]
pub struct CorrelationStats {
    /// Calls registered.
    pub registered: AtomicU64,
    /// Calls settled by a matching result frame.
    pub settled: AtomicU64,
    /// Result frames with no matching entry.
    pub orphaned: AtomicU64,
    /// Calls abandoned by their caller.
    pub cancelled: AtomicU64,
    /// Calls removed after their deadline.
    pub timed_out: AtomicU64,
    /// Calls failed by channel teardown.
    pub failed: AtomicU64,
}

/// Point-in-time copy of [`CorrelationStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub settled: u64,
    pub orphaned: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    pub failed: u64,
}

impl CorrelationStats {
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.registered.load(Ordering::Relaxed),
            settled: self.settled.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Per-channel correlation table.
pub struct CorrelationTable {
    /// Channel label for log fields.
    channel: String,
    /// Outstanding calls.
    pending: DashMap<CallId, PendingCall>,
    /// Next ID candidate (monotonic, wraps below `MAX_ID`).
    next_id: AtomicU64,
    stats: CorrelationStats,
}

impl CorrelationTable {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            pending: DashMap::new(),
            next_id: AtomicU64::new(0),
            stats: CorrelationStats::default(),
        }
    }

    /// Allocate an ID and register a pending call under it.
    ///
    /// IDs increase monotonically; an ID still outstanding after wrap-around
    /// is skipped.
    pub fn register(
        &self,
        kind: CallKind,
        path: &str,
        timeout: Option<Duration>,
    ) -> (CallId, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        let call = PendingCall {
            sender: tx,
            created_at: Instant::now(),
            kind,
            path: path.to_string(),
            timeout,
        };

        let id = loop {
            let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
            let id = CallId(raw % MAX_ID + 1);
            match self.pending.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(call);
                    break id;
                }
                Entry::Occupied(_) => {
                    debug!(channel = %self.channel, call_id = %id, "Correlation ID still outstanding, skipping");
                }
            }
        };

        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            channel = %self.channel,
            call_id = %id,
            kind = %kind,
            path = path,
            "Registered pending call"
        );
        (id, rx)
    }

    /// Settle a pending call with the outcome from its result frame.
    ///
    /// Returns `false` for an unknown ID; that is logged and counted, never raised.
    pub fn settle(&self, id: CallId, outcome: Outcome) -> bool {
        let Some((_, call)) = self.pending.remove(&id) else {
            self.record_orphan(id);
            return false;
        };

        let elapsed = call.created_at.elapsed();
        let is_error = outcome.is_error();
        self.stats.settled.fetch_add(1, Ordering::Relaxed);
        if call.sender.send(Ok(outcome)).is_err() {
            // Receiver dropped between removal and delivery.
            debug!(channel = %self.channel, call_id = %id, "Pending call receiver dropped");
            return true;
        }
        debug!(
            channel = %self.channel,
            call_id = %id,
            kind = %call.kind,
            path = call.path,
            is_error,
            elapsed_ms = elapsed.as_millis() as u64,
            "Settled pending call"
        );
        true
    }

    /// Count and log a result frame that matched nothing.
    pub fn record_orphan(&self, id: CallId) {
        self.stats.orphaned.fetch_add(1, Ordering::Relaxed);
        warn!(
            channel = %self.channel,
            call_id = %id,
            "Result for unknown or already settled call ID"
        );
    }

    /// Drop a pending call on behalf of its caller. Returns `false` if it was
    /// no longer pending.
    pub fn cancel(&self, id: CallId) -> bool {
        if self.pending.remove(&id).is_some() {
            self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(channel = %self.channel, call_id = %id, "Cancelled pending call");
            true
        } else {
            false
        }
    }

    /// Drop a pending call whose deadline passed. Returns `false` if it was
    /// no longer pending.
    pub fn expire(&self, id: CallId) -> bool {
        let Some((_, call)) = self.pending.remove(&id) else {
            return false;
        };
        self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
        warn!(
            channel = %self.channel,
            call_id = %id,
            path = call.path,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            "Pending call timed out"
        );
        true
    }

    /// Settle every call whose own timeout has elapsed with `CallError::TimedOut`.
    ///
    /// Returns the number of calls removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(CallId, Duration)> = self
            .pending
            .iter()
            .filter_map(|entry| {
                let timeout = entry.timeout?;
                (now.duration_since(entry.created_at) > timeout).then(|| (*entry.key(), timeout))
            })
            .collect();

        let mut removed = 0;
        for (id, timeout) in expired {
            if let Some((_, call)) = self.pending.remove(&id) {
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(
                    channel = %self.channel,
                    call_id = %id,
                    path = call.path,
                    timeout_ms = timeout.as_millis() as u64,
                    "Removing expired pending call"
                );
                let _ = call
                    .sender
                    .send(Err(CallError::TimedOut(timeout.as_millis() as u64)));
                removed += 1;
            }
        }
        removed
    }

    /// Fail every pending call. Used on channel teardown.
    pub fn fail_all(&self, error: &CallError) -> usize {
        let ids: Vec<CallId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, call)) = self.pending.remove(&id) {
                let _ = call.sender.send(Err(error.clone()));
                failed += 1;
            }
        }
        if failed > 0 {
            self.stats.failed.fetch_add(failed as u64, Ordering::Relaxed);
            warn!(channel = %self.channel, failed, error = %error, "Failed all pending calls");
        }
        failed
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, id: CallId) -> bool {
        self.pending.contains_key(&id)
    }

    #[must_use]
    pub fn stats(&self) -> &CorrelationStats {
        &self.stats
    }

    #[cfg(test)]
    fn set_next_id(&self, raw: u64) {
        self.next_id.store(raw, Ordering::Relaxed);
    }
}
