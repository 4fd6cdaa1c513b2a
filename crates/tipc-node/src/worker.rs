//! Procedures a worker serves to the coordinator.

use crate::api::WorkerPing;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tipc_core::{CallContext, CancellationToken, ProcedureRouter, RouterError};
use tracing::info;

/// Per-worker state shared by its procedures.
#[derive(Debug)]
pub struct WorkerState {
    name: String,
    pings: AtomicU64,
    ping_delay: Duration,
    exit: CancellationToken,
}

impl WorkerState {
    pub fn new(name: impl Into<String>, ping_delay: Duration) -> Self {
        Self {
            name: name.into(),
            pings: AtomicU64::new(0),
            ping_delay,
            exit: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pings answered so far.
    #[must_use]
    pub fn pings(&self) -> u64 {
        self.pings.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn exit_requested(&self) -> bool {
        self.exit.is_cancelled()
    }

    /// Resolves once `exit` has been called.
    pub async fn exited(&self) {
        self.exit.cancelled().await;
    }
}

/// `ping`, `doThing` and `exit`.
#[must_use]
pub fn router(state: Arc<WorkerState>) -> ProcedureRouter {
    let ping_state = Arc::clone(&state);
    let exit_state = state;

    ProcedureRouter::new()
        .query("ping", move |ctx: CallContext, _| {
            let state = Arc::clone(&ping_state);
            async move {
                info!(worker = %state.name, call_id = %ctx.id, context = ?ctx.context, "worker.ping");
                tokio::time::sleep(state.ping_delay).await;
                let counter = state.pings.fetch_add(1, Ordering::Relaxed) + 1;
                Ok::<_, RouterError>(WorkerPing {
                    date: Utc::now(),
                    counter,
                })
            }
        })
        .mutation("doThing", |_, _| async { Ok::<_, RouterError>(5_i64) })
        .mutation("exit", move |_, _| {
            let state = Arc::clone(&exit_state);
            async move {
                info!(worker = %state.name, "Exit requested");
                state.exit.cancel();
                Ok::<_, RouterError>(())
            }
        })
}
