//! # Request Handler
//!
//! Answers inbound call frames with a router.
//!
//! ```text
//! Subscription ──call frame──→ serve loop ──spawn──→ call task ──→ Router::call
//!                                                        │
//!                      transport ←── result frame ───────┘
//! ```
//!
//! The serve loop only decodes and spawns, so a slow procedure never holds up
//! later frames. Every decodable call frame gets exactly one result frame,
//! including when the procedure fails or panics.

use crate::channel::{Channel, ChannelInner, Subscription};
use crate::codec::FrameRef;
use crate::error::ServeError;
use crate::router::{CallContext, Router, RouterError};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tipc_types::{Operation, Outcome, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Request handler options.
#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    /// Context handed to every procedure. When unset the caller's own
    /// context is used.
    pub context: Option<Value>,
}

impl HandlerOptions {
    #[must_use]
    pub fn with_context(context: impl Into<Value>) -> Self {
        Self {
            context: Some(context.into()),
        }
    }
}

/// Handle to a running request handler.
///
/// Dropping it leaves the handler running until the channel closes.
#[derive(Debug)]
pub struct ServeHandle {
    task: JoinHandle<()>,
    channel: Weak<ChannelInner>,
}

impl ServeHandle {
    /// Stop accepting calls. Calls already running still send their result.
    ///
    /// The channel can be served again as soon as this returns.
    pub fn shutdown(self) {
        self.task.abort();
        if let Some(inner) = self.channel.upgrade() {
            inner.serving.store(false, Ordering::Release);
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the handler to stop (channel closed or shut down).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

impl Channel {
    /// Serve inbound calls on this channel with `router`.
    ///
    /// A channel has at most one handler at a time; a second one would answer
    /// every call twice.
    ///
    /// # Errors
    ///
    /// `ServeError::AlreadyServing` while another handler is running.
    pub fn serve<R: Router>(
        &self,
        router: R,
        options: HandlerOptions,
    ) -> Result<ServeHandle, ServeError> {
        if self.inner.serving.swap(true, Ordering::AcqRel) {
            warn!(channel = %self.name(), "Request handler already running, refusing second one");
            return Err(ServeError::AlreadyServing(self.name().to_string()));
        }
        let subscription = self.subscribe();
        info!(channel = %self.name(), "Request handler started");
        let task = tokio::spawn(serve_loop(
            self.clone(),
            Arc::new(router),
            options,
            subscription,
        ));
        Ok(ServeHandle {
            task,
            channel: Arc::downgrade(&self.inner),
        })
    }
}

async fn serve_loop(
    channel: Channel,
    router: Arc<dyn Router>,
    options: HandlerOptions,
    mut subscription: Subscription,
) {
    while let Some(message) = subscription.recv().await {
        let inner = &channel.inner;
        let Ok(FrameRef::Call { body }) = inner.codec.classify(&message) else {
            continue;
        };
        let op = match inner.codec.decode_call(body) {
            Ok(op) => op,
            Err(e) => {
                inner.record_malformed(&e);
                continue;
            }
        };

        tokio::spawn(handle_call(
            channel.clone(),
            Arc::clone(&router),
            options.context.clone(),
            op,
        ));
    }
    channel.inner.serving.store(false, Ordering::Release);
    debug!(channel = %channel.name(), "Request handler stopped");
}

async fn handle_call(
    channel: Channel,
    router: Arc<dyn Router>,
    context_override: Option<Value>,
    op: Operation,
) {
    let Operation {
        id,
        kind,
        path,
        input,
        context,
    } = op;
    let ctx = CallContext {
        id,
        channel: channel.name().to_string(),
        context: context_override.or(context),
    };
    let started = Instant::now();

    // Run the procedure on its own task so a panic is contained.
    let task_path = path.clone();
    let joined =
        tokio::spawn(async move { router.call(ctx, kind, &task_path, input).await }).await;

    let outcome = match joined {
        Ok(Ok(value)) => Outcome::Data(value),
        Ok(Err(e)) => {
            match &e {
                RouterError::Failed(_) => {
                    debug!(call_id = %id, path = %path, error = %e, "Procedure failed");
                }
                _ => warn!(call_id = %id, path = %path, error = %e, "Call rejected"),
            }
            Outcome::Error(e.into_value())
        }
        Err(join) => {
            let reason = if join.is_panic() {
                "procedure panicked"
            } else {
                "procedure was cancelled"
            };
            error!(call_id = %id, path = %path, reason, "Procedure did not complete");
            Outcome::Error(RouterError::Internal(reason.to_string()).into_value())
        }
    };

    let inner = &channel.inner;
    inner.record_handled(outcome.is_error());

    let frame = match inner.codec.encode_result(id, &outcome) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(call_id = %id, path = %path, error = %e, "Result not encodable, answering with error");
            let fallback =
                RouterError::Internal(format!("result could not be encoded: {e}")).into_value();
            match inner.codec.encode_result(id, &Outcome::Error(fallback)) {
                Ok(frame) => frame,
                Err(e) => {
                    error!(call_id = %id, error = %e, "Error outcome not encodable");
                    return;
                }
            }
        }
    };

    if let Err(e) = inner.send(frame.into()).await {
        warn!(call_id = %id, path = %path, error = %e, "Failed to send result");
        return;
    }
    debug!(
        channel = %inner.config.name,
        call_id = %id,
        kind = %kind,
        path = %path,
        is_error = outcome.is_error(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Answered call"
    );
}
