//! # Call Dispatcher
//!
//! Sends call frames and hands back a [`PendingReply`] that resolves when the
//! matching result frame arrives.
//!
//! ```text
//! dispatch() ── register ──→ CorrelationTable
//!            ── encode + send ──→ transport
//!            ←── PendingReply (settled by the channel reader)
//! ```
//!
//! A `PendingReply` owns its table entry: dropping it before it settles
//! removes the entry, so a late result frame is treated as an orphan.

use crate::channel::Channel;
use crate::correlation::Settlement;
use crate::error::CallError;
use futures::future::BoxFuture;
use std::future::IntoFuture;
use std::time::Duration;
use tipc_types::{CallId, CallKind, Operation, Outcome, Value};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Opaque value delivered to the remote router alongside the input.
    pub context: Option<Value>,
    /// Overrides the channel's default timeout.
    pub timeout: Option<Duration>,
    /// Abandons the call when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    #[must_use]
    pub fn with_context(mut self, context: impl Into<Value>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Issues calls over one channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Client {
    channel: Channel,
}

impl Channel {
    /// A call dispatcher bound to this channel.
    #[must_use]
    pub fn client(&self) -> Client {
        Client::new(self.clone())
    }
}

impl Client {
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Register and send one call.
    ///
    /// Returns once the call frame is on the transport. The entry is removed
    /// again if encoding or sending fails.
    pub async fn dispatch(
        &self,
        kind: CallKind,
        path: &str,
        input: Value,
        options: CallOptions,
    ) -> Result<PendingReply, CallError> {
        let inner = &self.channel.inner;
        if inner.is_closed() {
            return Err(CallError::ChannelClosed);
        }
        if options
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(CallError::Cancelled);
        }

        let timeout = options.timeout.or_else(|| inner.config.default_timeout());
        // The deadline runs from dispatch, not from the first poll.
        let deadline = timeout.map(|d| Instant::now() + d);
        let (id, receiver) = inner.table.register(kind, path, timeout);
        let guard = EntryGuard {
            channel: self.channel.clone(),
            id,
            armed: true,
        };

        let op = Operation::new(id, kind, path, input).with_context(options.context);
        let frame = inner.codec.encode_call(&op)?;
        inner.send(frame.into()).await?;

        debug!(
            channel = %inner.config.name,
            call_id = %id,
            kind = %kind,
            path,
            "Dispatched call"
        );

        Ok(PendingReply {
            id,
            receiver,
            timeout,
            deadline,
            cancel: options.cancel,
            guard,
        })
    }

    /// Dispatch and wait for the outcome.
    pub async fn call(
        &self,
        kind: CallKind,
        path: &str,
        input: Value,
        options: CallOptions,
    ) -> Result<Outcome, CallError> {
        self.dispatch(kind, path, input, options).await?.await
    }

    /// Query with default options; an error outcome becomes `CallError::Remote`.
    pub async fn query(&self, path: &str, input: impl Into<Value>) -> Result<Value, CallError> {
        self.call(CallKind::Query, path, input.into(), CallOptions::default())
            .await?
            .into_result()
            .map_err(CallError::Remote)
    }

    /// Mutation with default options; an error outcome becomes `CallError::Remote`.
    pub async fn mutate(&self, path: &str, input: impl Into<Value>) -> Result<Value, CallError> {
        self.call(CallKind::Mutation, path, input.into(), CallOptions::default())
            .await?
            .into_result()
            .map_err(CallError::Remote)
    }
}

/// Removes the table entry on drop unless disarmed.
struct EntryGuard {
    channel: Channel,
    id: CallId,
    armed: bool,
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        if self.armed {
            self.channel.inner.table.cancel(self.id);
        }
    }
}

enum Wake {
    Settled(Result<Settlement, oneshot::error::RecvError>),
    Deadline,
    Cancelled,
}

/// A dispatched call awaiting its result frame.
///
/// Await it directly (or call [`PendingReply::wait`]). Dropping it cancels
/// the call locally; the peer is not notified.
#[must_use = "dropping a PendingReply cancels the call"]
pub struct PendingReply {
    id: CallId,
    receiver: oneshot::Receiver<Settlement>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
    guard: EntryGuard,
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PendingReply {
    #[must_use]
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Abandon the call. Returns `false` if it had already settled.
    pub fn cancel(mut self) -> bool {
        self.guard.armed = false;
        self.guard.channel.inner.table.cancel(self.id)
    }

    /// Wait for the call to settle, time out or be cancelled.
    pub async fn wait(self) -> Result<Outcome, CallError> {
        let PendingReply {
            id,
            mut receiver,
            timeout,
            deadline,
            cancel,
            mut guard,
        } = self;

        let expiry = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        let cancelled = async {
            match &cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let wake = tokio::select! {
            biased;
            settled = &mut receiver => Wake::Settled(settled),
            () = expiry => Wake::Deadline,
            () = cancelled => Wake::Cancelled,
        };
        guard.armed = false;

        let table = &guard.channel.inner.table;
        match wake {
            Wake::Settled(settled) => flatten(settled),
            Wake::Deadline => {
                if table.expire(id) {
                    let ms = timeout.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
                    Err(CallError::TimedOut(ms))
                } else {
                    // Settled concurrently; its value is already on the way.
                    flatten(receiver.await)
                }
            }
            Wake::Cancelled => {
                if table.cancel(id) {
                    Err(CallError::Cancelled)
                } else {
                    flatten(receiver.await)
                }
            }
        }
    }
}

fn flatten(settled: Result<Settlement, oneshot::error::RecvError>) -> Result<Outcome, CallError> {
    // A dropped sender means the table itself went away.
    settled.unwrap_or(Err(CallError::ChannelClosed))
}

impl IntoFuture for PendingReply {
    type Output = Result<Outcome, CallError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
