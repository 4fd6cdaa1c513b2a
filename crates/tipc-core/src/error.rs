//! # Error Types
//!
//! Local failures of a call. Application failures reported by the peer travel
//! as `Outcome::Error` and only become `CallError::Remote` at the proxy.

use crate::codec::CodecError;
use thiserror::Error;
use tipc_types::{Value, ValueError};

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The other end is gone.
    #[error("transport closed")]
    Closed,

    /// I/O failure on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// The channel was never bound to a concrete transport.
    #[error("no transport bound to channel `{0}`")]
    Unimplemented(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

/// Why a request handler could not be started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServeError {
    /// Another handler is already answering calls on this channel.
    #[error("channel `{0}` already has a request handler")]
    AlreadyServing(String),
}

/// Why a call did not produce a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// The peer answered with an error outcome.
    #[error("remote error: {0}")]
    Remote(Value),

    /// The call frame could not be sent.
    #[error("send failed: {0}")]
    Transport(#[from] TransportError),

    /// The call could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] CodecError),

    /// The call outlived its deadline.
    #[error("call timed out after {0}ms")]
    TimedOut(u64),

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// The channel was torn down before the call settled.
    #[error("channel closed")]
    ChannelClosed,

    /// The peer's answer did not match the expected output type.
    #[error("unexpected output: {0}")]
    Decode(#[from] ValueError),
}

impl CallError {
    /// The remote error payload, if the peer reported one.
    #[must_use]
    pub fn remote_value(&self) -> Option<&Value> {
        match self {
            CallError::Remote(v) => Some(v),
            _ => None,
        }
    }
}
