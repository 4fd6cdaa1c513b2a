//! # TIPC Types
//!
//! Value model and call envelopes shared by the TIPC crates.
//!
//! ## Contents
//!
//! - [`Value`]: JSON superset with a `Timestamp` extended scalar
//! - [`Operation`]: one remote call request (`id`, `kind`, `path`, `input`, `context`)
//! - [`Outcome`]: the tagged answer to a call, `Data` or `Error`
//! - [`FromValue`]: typed decoding used by the proxy surface

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod convert;
pub mod errors;
pub mod operation;
pub mod value;

pub use convert::{expect_object, take_field, FromValue};
pub use errors::ValueError;
pub use operation::{CallId, CallKind, Operation, Outcome};
pub use value::{format_timestamp, Map, Value};
