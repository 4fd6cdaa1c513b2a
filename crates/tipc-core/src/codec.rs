//! # Wire Codec
//!
//! Call and result frames share one channel and are told apart by two
//! disjoint tags:
//!
//! ```text
//! <prefix>call::<json>
//! <prefix>result::<id>:<json>
//! ```
//!
//! `<json>` is the transformer's output for `Operation::to_value()` or
//! `Outcome::to_value(id)`. The result ID is also written outside the JSON so
//! the reader can look up the pending call before paying for deserialization.

use crate::transformer::{TransformError, Transformer};
use crate::transport::RawMessage;
use std::sync::Arc;
use thiserror::Error;
use tipc_types::{CallId, Operation, Outcome, ValueError};

/// Reasons a message is not a well-formed protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("binary message")]
    NotText,

    #[error("no recognised frame tag")]
    UnknownTag,

    #[error("malformed result id: {0:?}")]
    MalformedId(String),

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("transformer: {0}")]
    Transform(#[from] TransformError),

    #[error("result id mismatch: header {outer}, payload {inner}")]
    IdMismatch { outer: CallId, inner: CallId },

    #[error("invalid payload: {0}")]
    Invalid(#[from] ValueError),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Json(e.to_string())
    }
}

/// A fully decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call(Operation),
    Result { id: CallId, outcome: Outcome },
}

/// A frame whose tag (and result ID) has been read but whose body has not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRef<'a> {
    Call { body: &'a str },
    Result { id: CallId, body: &'a str },
}

/// Encodes and decodes frames for one channel.
#[derive(Clone)]
pub struct WireCodec {
    transformer: Arc<dyn Transformer>,
    call_tag: String,
    result_tag: String,
}

impl std::fmt::Debug for WireCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireCodec")
            .field("transformer", &self.transformer.name())
            .field("call_tag", &self.call_tag)
            .field("result_tag", &self.result_tag)
            .finish()
    }
}

impl WireCodec {
    pub fn new(prefix: &str, transformer: Arc<dyn Transformer>) -> Self {
        Self {
            transformer,
            call_tag: format!("{prefix}call::"),
            result_tag: format!("{prefix}result::"),
        }
    }

    #[must_use]
    pub fn transformer(&self) -> &Arc<dyn Transformer> {
        &self.transformer
    }

    /// `<prefix>call::<json>`
    pub fn encode_call(&self, op: &Operation) -> Result<String, CodecError> {
        let wire = self.transformer.serialize(&op.to_value())?;
        Ok(format!("{}{}", self.call_tag, serde_json::to_string(&wire)?))
    }

    /// `<prefix>result::<id>:<json>`
    pub fn encode_result(&self, id: CallId, outcome: &Outcome) -> Result<String, CodecError> {
        let wire = self.transformer.serialize(&outcome.to_value(id))?;
        Ok(format!(
            "{}{}:{}",
            self.result_tag,
            id,
            serde_json::to_string(&wire)?
        ))
    }

    /// Read the tag (and result ID) without touching the body.
    pub fn classify<'a>(&self, message: &'a RawMessage) -> Result<FrameRef<'a>, CodecError> {
        let text = message.as_text().ok_or(CodecError::NotText)?;

        if let Some(rest) = text.strip_prefix(self.result_tag.as_str()) {
            let (id, body) = rest
                .split_once(':')
                .ok_or_else(|| CodecError::MalformedId(rest.chars().take(24).collect()))?;
            let id = id
                .parse::<CallId>()
                .map_err(|_| CodecError::MalformedId(id.to_string()))?;
            return Ok(FrameRef::Result { id, body });
        }

        if let Some(body) = text.strip_prefix(self.call_tag.as_str()) {
            return Ok(FrameRef::Call { body });
        }

        Err(CodecError::UnknownTag)
    }

    pub fn decode_call(&self, body: &str) -> Result<Operation, CodecError> {
        let wire: serde_json::Value = serde_json::from_str(body)?;
        let value = self.transformer.deserialize(wire)?;
        Ok(Operation::from_value(value)?)
    }

    /// Decode a result body and check it against the header ID.
    pub fn decode_result(&self, id: CallId, body: &str) -> Result<Outcome, CodecError> {
        let wire: serde_json::Value = serde_json::from_str(body)?;
        let value = self.transformer.deserialize(wire)?;
        let (inner, outcome) = Outcome::from_value(value)?;
        if inner != id {
            return Err(CodecError::IdMismatch { outer: id, inner });
        }
        Ok(outcome)
    }

    /// Classify and decode in one step.
    pub fn decode(&self, message: &RawMessage) -> Result<Frame, CodecError> {
        match self.classify(message)? {
            FrameRef::Call { body } => self.decode_call(body).map(Frame::Call),
            FrameRef::Result { id, body } => {
                let outcome = self.decode_result(id, body)?;
                Ok(Frame::Result { id, outcome })
            }
        }
    }
}
