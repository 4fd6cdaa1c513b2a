//! # Router
//!
//! The capability the request handler invokes for each inbound call.
//!
//! [`ProcedureRouter`] is a statically built registry of `path -> handler`.
//! Nested routers are merged under a dotted prefix:
//!
//! ```text
//! ProcedureRouter::new()
//!     .query("ping", ping)
//!     .merge("woah", ProcedureRouter::new()
//!         .merge("nested", ProcedureRouter::new().query("yee", yee)))
//!
//! registers: ping (query), woah.nested.yee (query)
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tipc_types::{CallId, CallKind, Value, ValueError};
use tracing::warn;

/// Per-call information handed to the router.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    /// Correlation ID of the inbound call.
    pub id: CallId,
    /// Name of the channel the call arrived on.
    pub channel: String,
    /// Handler-level context if configured, else the caller's context.
    pub context: Option<Value>,
}

/// Failures raised while executing a procedure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    #[error("no procedure at path `{0}`")]
    NotFound(String),

    #[error("`{path}` is a {registered}, called as a {requested}")]
    KindMismatch {
        path: String,
        registered: CallKind,
        requested: CallKind,
    },

    #[error("bad input: {0}")]
    BadInput(#[from] ValueError),

    /// An application error; the payload is sent back unchanged.
    #[error("procedure failed: {0}")]
    Failed(Value),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Application failure carrying `value` back to the caller as-is.
    pub fn failed(value: impl Into<Value>) -> Self {
        RouterError::Failed(value.into())
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            RouterError::NotFound(_) => "NOT_FOUND",
            RouterError::KindMismatch { .. } => "METHOD_NOT_SUPPORTED",
            RouterError::BadInput(_) => "BAD_REQUEST",
            RouterError::Failed(_) => "FAILED",
            RouterError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// The error value sent back in `Outcome::Error`.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            RouterError::Failed(value) => value,
            other => Value::object([
                ("code", Value::from(other.code())),
                ("message", Value::from(other.to_string())),
            ]),
        }
    }
}

/// Executes named procedures.
#[async_trait]
pub trait Router: Send + Sync + 'static {
    async fn call(
        &self,
        ctx: CallContext,
        kind: CallKind,
        path: &str,
        input: Value,
    ) -> Result<Value, RouterError>;
}

#[async_trait]
impl<R: Router + ?Sized> Router for Arc<R> {
    async fn call(
        &self,
        ctx: CallContext,
        kind: CallKind,
        path: &str,
        input: Value,
    ) -> Result<Value, RouterError> {
        (**self).call(ctx, kind, path, input).await
    }
}

type HandlerFn =
    Arc<dyn Fn(CallContext, Value) -> BoxFuture<'static, Result<Value, RouterError>> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    kind: CallKind,
    handler: HandlerFn,
}

/// Registry of procedures keyed by dotted path.
#[derive(Clone, Default)]
pub struct ProcedureRouter {
    procedures: BTreeMap<String, Entry>,
}

impl std::fmt::Debug for ProcedureRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.procedures.iter().map(|(path, e)| (path, e.kind)))
            .finish()
    }
}

impl ProcedureRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query.
    #[must_use]
    pub fn query<F, Fut, O>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RouterError>> + Send + 'static,
        O: Into<Value> + Send + 'static,
    {
        self.register(CallKind::Query, path.into(), handler)
    }

    /// Register a mutation.
    #[must_use]
    pub fn mutation<F, Fut, O>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RouterError>> + Send + 'static,
        O: Into<Value> + Send + 'static,
    {
        self.register(CallKind::Mutation, path.into(), handler)
    }

    /// Mount every procedure of `other` under `prefix.`. An empty prefix
    /// mounts at the root.
    #[must_use]
    pub fn merge(mut self, prefix: &str, other: ProcedureRouter) -> Self {
        for (path, entry) in other.procedures {
            let full = if prefix.is_empty() {
                path
            } else {
                format!("{prefix}.{path}")
            };
            self.insert(full, entry);
        }
        self
    }

    /// Registered paths and their kinds, in path order.
    pub fn procedures(&self) -> impl Iterator<Item = (&str, CallKind)> {
        self.procedures.iter().map(|(p, e)| (p.as_str(), e.kind))
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.procedures.contains_key(path)
    }

    fn register<F, Fut, O>(mut self, kind: CallKind, path: String, handler: F) -> Self
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RouterError>> + Send + 'static,
        O: Into<Value> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(
            move |ctx: CallContext, input: Value| -> BoxFuture<'static, Result<Value, RouterError>> {
                let fut = handler(ctx, input);
                Box::pin(async move { fut.await.map(Into::into) })
            },
        );
        self.insert(path, Entry { kind, handler });
        self
    }

    fn insert(&mut self, path: String, entry: Entry) {
        if self.procedures.insert(path.clone(), entry).is_some() {
            warn!(path = %path, "Procedure registered twice, keeping the later one");
        }
    }
}

#[async_trait]
impl Router for ProcedureRouter {
    async fn call(
        &self,
        ctx: CallContext,
        kind: CallKind,
        path: &str,
        input: Value,
    ) -> Result<Value, RouterError> {
        let entry = self
            .procedures
            .get(path)
            .ok_or_else(|| RouterError::NotFound(path.to_string()))?;
        if entry.kind != kind {
            return Err(RouterError::KindMismatch {
                path: path.to_string(),
                registered: entry.kind,
                requested: kind,
            });
        }
        (entry.handler)(ctx, input).await
    }
}
