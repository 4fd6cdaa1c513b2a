//! # Proxy Surface
//!
//! Typed sugar over [`Client`]. No correlation or transport logic lives here.
//!
//! This is the only layer that turns `Outcome::Error` into a Rust error
//! (`CallError::Remote`); below it outcomes stay explicit.
//!
//! Three ways in, from most to least typed:
//!
//! - [`remote_api!`](crate::remote_api): a stub struct generated from a fixed schema
//! - [`Procedure`] descriptors passed to [`Proxy::invoke`]
//! - [`PathHandle`] built segment by segment for paths only known at runtime

use crate::client::{CallOptions, Client};
use crate::error::CallError;
use std::fmt;
use std::marker::PhantomData;
use tipc_types::{CallKind, FromValue, Value};

/// A remote procedure with a fixed path, kind and signature.
pub struct Procedure<I, O> {
    kind: CallKind,
    path: &'static str,
    _signature: PhantomData<fn(I) -> O>,
}

impl<I, O> Procedure<I, O> {
    #[must_use]
    pub const fn query(path: &'static str) -> Self {
        Self {
            kind: CallKind::Query,
            path,
            _signature: PhantomData,
        }
    }

    #[must_use]
    pub const fn mutation(path: &'static str) -> Self {
        Self {
            kind: CallKind::Mutation,
            path,
            _signature: PhantomData,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CallKind {
        self.kind
    }

    #[must_use]
    pub const fn path(&self) -> &'static str {
        self.path
    }
}

impl<I, O> Clone for Procedure<I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, O> Copy for Procedure<I, O> {}

impl<I, O> fmt::Debug for Procedure<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Procedure({} {})", self.kind, self.path)
    }
}

/// Typed entry point for calling a peer.
#[derive(Debug, Clone)]
pub struct Proxy {
    client: Client,
    options: CallOptions,
}

impl Proxy {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            options: CallOptions::default(),
        }
    }

    /// Options applied to every call made through this proxy.
    #[must_use]
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<Value>) -> Self {
        self.options.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Call `procedure` and decode its output.
    pub async fn invoke<I, O>(&self, procedure: &Procedure<I, O>, input: I) -> Result<O, CallError>
    where
        I: Into<Value>,
        O: FromValue,
    {
        let value = self
            .call_path(procedure.kind(), procedure.path(), input.into())
            .await?;
        Ok(O::from_value(value)?)
    }

    /// Start a dynamic path at `segment`.
    #[must_use]
    pub fn path(&self, segment: &str) -> PathHandle {
        PathHandle {
            proxy: self.clone(),
            path: segment.to_string(),
        }
    }

    async fn call_path(&self, kind: CallKind, path: &str, input: Value) -> Result<Value, CallError> {
        self.client
            .call(kind, path, input, self.options.clone())
            .await?
            .into_result()
            .map_err(CallError::Remote)
    }
}

/// A dotted path assembled at runtime.
#[derive(Debug, Clone)]
pub struct PathHandle {
    proxy: Proxy,
    path: String,
}

impl PathHandle {
    /// Extend the path by one segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> PathHandle {
        PathHandle {
            proxy: self.proxy.clone(),
            path: format!("{}.{segment}", self.path),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn query(&self, input: impl Into<Value>) -> Result<Value, CallError> {
        self.invoke(CallKind::Query, input).await
    }

    pub async fn mutate(&self, input: impl Into<Value>) -> Result<Value, CallError> {
        self.invoke(CallKind::Mutation, input).await
    }

    pub async fn invoke(&self, kind: CallKind, input: impl Into<Value>) -> Result<Value, CallError> {
        self.proxy.call_path(kind, &self.path, input.into()).await
    }
}

/// Generate a typed stub for a peer's procedures.
///
/// ```ignore
/// tipc_core::remote_api! {
///     pub struct WorkerApi {
///         query ping("ping"): () => Value;
///         mutation do_thing("doThing"): () => i64;
///     }
/// }
///
/// let worker = WorkerApi::new(Proxy::new(channel.client()));
/// let five = worker.do_thing(()).await?;
/// ```
#[macro_export]
macro_rules! remote_api {
    (@procedure query $path:literal) => {
        $crate::Procedure::query($path)
    };
    (@procedure mutation $path:literal) => {
        $crate::Procedure::mutation($path)
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$method_meta:meta])*
                $kind:ident $method:ident($path:literal): $input:ty => $output:ty;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            proxy: $crate::Proxy,
        }

        impl $name {
            #[must_use]
            pub fn new(proxy: $crate::Proxy) -> Self {
                Self { proxy }
            }

            #[must_use]
            pub fn proxy(&self) -> &$crate::Proxy {
                &self.proxy
            }

            $(
                $(#[$method_meta])*
                pub async fn $method(
                    &self,
                    input: $input,
                ) -> ::std::result::Result<$output, $crate::CallError> {
                    let procedure: $crate::Procedure<$input, $output> =
                        $crate::remote_api!(@procedure $kind $path);
                    self.proxy.invoke(&procedure, input).await
                }
            )*
        }
    };
}
