//! # TIPC Core
//!
//! Request/response correlation for two peers sharing one duplex message
//! channel. Either peer can call the other; calls and results travel as
//! tagged text frames on the same link.
//!
//! ## Architecture
//!
//! ```text
//!   caller                                                  callee
//! ┌──────────────────────┐                      ┌──────────────────────┐
//! │ Proxy / Client       │  <prefix>call::{..}  │ Request Handler      │
//! │   │ register         │ ───────────────────→ │   │ spawn per call   │
//! │   ▼                  │                      │   ▼                  │
//! │ CorrelationTable     │  <prefix>result::..  │ Router               │
//! │   ▲ settle           │ ←─────────────────── │                      │
//! │ Channel reader       │                      │                      │
//! └──────────────────────┘                      └──────────────────────┘
//! ```
//!
//! Both roles usually run on both ends of the same channel.
//!
//! ## Modules
//!
//! - [`channel`]: transport binding, reader task, subscriptions, teardown
//! - [`codec`]: frame tags and payload encoding
//! - [`transformer`]: value to wire JSON (plain or tagged)
//! - [`correlation`]: correlation IDs and pending calls
//! - [`client`]: outbound calls with timeout and cancellation
//! - [`router`] / [`handler`]: inbound calls
//! - [`proxy`]: typed call surface and `remote_api!`

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channel;
pub mod client;
pub mod codec;
pub mod config;
pub mod correlation;
pub mod error;
pub mod handler;
pub mod proxy;
pub mod router;
pub mod transformer;
pub mod transport;

pub use channel::{Channel, ChannelStats, Subscription};
pub use client::{CallOptions, Client, PendingReply};
pub use codec::{CodecError, Frame, FrameRef, WireCodec};
pub use config::{ChannelConfig, ConfigError, TransformerKind, DEFAULT_PREFIX};
pub use correlation::{CorrelationStats, CorrelationTable, Settlement, StatsSnapshot};
pub use error::{CallError, ServeError, TransportError};
pub use handler::{HandlerOptions, ServeHandle};
pub use proxy::{PathHandle, Procedure, Proxy};
pub use router::{CallContext, ProcedureRouter, Router, RouterError};
pub use transformer::{PlainJson, TaggedJson, TransformError, Transformer};
pub use transport::{Detached, FrameReceiver, FrameSender, RawMessage};

pub use tipc_types::{CallId, CallKind, FromValue, Operation, Outcome, Value, ValueError};
pub use tokio_util::sync::CancellationToken;
