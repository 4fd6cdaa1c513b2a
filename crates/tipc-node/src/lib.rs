//! # TIPC Node
//!
//! A coordinator and a worker that serve procedures to each other over one
//! duplex link.
//!
//! ## Modules
//!
//! - `config/` - TOML and environment configuration
//! - `api/` - Payload types and typed stubs (`CoordinatorApi`, `WorkerApi`)
//! - `coordinator/` - Coordinator procedures
//! - `worker/` - Worker procedures and state
//! - `runtime/` - Channel wiring and the demo sequence

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod api;
pub mod config;
pub mod coordinator;
pub mod runtime;
pub mod worker;

pub use api::{CoordinatorApi, CoordinatorPing, WorkerApi, WorkerPing};
pub use config::{NodeConfig, NodeConfigError, TransportKind};
pub use runtime::{DemoReport, NodeError, NodeRuntime};
