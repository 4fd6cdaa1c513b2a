//! # Call Envelopes
//!
//! `Operation` is one remote call request; `Outcome` is its single answer.
//! Both convert to and from a `Value` so that any transformer can carry them.

use crate::convert::{expect_object, take_field, FromValue};
use crate::errors::ValueError;
use crate::value::{Map, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Correlation ID of one outstanding call on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl CallId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CallId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for CallId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Kind of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// Read-only call.
    Query,
    /// Call with side effects.
    Mutation,
}

impl CallKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Query => "query",
            CallKind::Mutation => "mutation",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallKind {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(CallKind::Query),
            "mutation" => Ok(CallKind::Mutation),
            other => Err(ValueError::InvalidField {
                field: "kind".into(),
                reason: format!("unknown call kind `{other}`"),
            }),
        }
    }
}

/// One remote call request.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Correlation ID assigned by the calling channel.
    pub id: CallId,
    /// Query or mutation.
    pub kind: CallKind,
    /// Dotted procedure path, e.g. `woah.nested.yee`.
    pub path: String,
    /// Call input.
    pub input: Value,
    /// Opaque caller metadata.
    pub context: Option<Value>,
}

impl Operation {
    pub fn new(id: CallId, kind: CallKind, path: impl Into<String>, input: Value) -> Self {
        Self {
            id,
            kind,
            path: path.into(),
            input,
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }

    /// Object form: `{id, kind, path, input, context}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), Value::Int(id_to_int(self.id)));
        map.insert("kind".into(), Value::from(self.kind.as_str()));
        map.insert("path".into(), Value::String(self.path.clone()));
        map.insert("input".into(), self.input.clone());
        map.insert("context".into(), self.context.clone().unwrap_or(Value::Null));
        Value::Object(map)
    }

    pub fn from_value(value: Value) -> Result<Self, ValueError> {
        let mut map = expect_object(value)?;
        let id = CallId(take_field::<u64>(&mut map, "id")?);
        let kind: String = take_field(&mut map, "kind")?;
        let kind = kind.parse()?;
        let path: String = take_field(&mut map, "path")?;
        if path.is_empty() {
            return Err(ValueError::InvalidField {
                field: "path".into(),
                reason: "empty path".into(),
            });
        }
        let input = map.remove("input").unwrap_or(Value::Null);
        let context = Option::<Value>::from_value(map.remove("context").unwrap_or(Value::Null))?;
        Ok(Self {
            id,
            kind,
            path,
            input,
            context,
        })
    }
}

/// The settled result of one call: exactly one of data or error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The procedure returned a value.
    Data(Value),
    /// The procedure failed; the payload is the normalised error value.
    Error(Value),
}

impl Outcome {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// Split into the host's native error signalling.
    pub fn into_result(self) -> Result<Value, Value> {
        match self {
            Outcome::Data(v) => Ok(v),
            Outcome::Error(e) => Err(e),
        }
    }

    /// Object form: `{id, data}` or `{id, error}`.
    #[must_use]
    pub fn to_value(&self, id: CallId) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), Value::Int(id_to_int(id)));
        match self {
            Outcome::Data(v) => map.insert("data".into(), v.clone()),
            Outcome::Error(e) => map.insert("error".into(), e.clone()),
        };
        Value::Object(map)
    }

    /// Parse the object form, returning the inner ID alongside the outcome.
    pub fn from_value(value: Value) -> Result<(CallId, Self), ValueError> {
        let mut map = expect_object(value)?;
        let id = CallId(take_field::<u64>(&mut map, "id")?);
        match (map.remove("data"), map.remove("error")) {
            (Some(data), None) => Ok((id, Outcome::Data(data))),
            (None, Some(error)) => Ok((id, Outcome::Error(error))),
            (Some(_), Some(_)) => Err(ValueError::InvalidField {
                field: "outcome".into(),
                reason: "both data and error present".into(),
            }),
            (None, None) => Err(ValueError::MissingField("data|error".into())),
        }
    }
}

impl From<Result<Value, Value>> for Outcome {
    fn from(result: Result<Value, Value>) -> Self {
        match result {
            Ok(v) => Outcome::Data(v),
            Err(e) => Outcome::Error(e),
        }
    }
}

// IDs above i64::MAX cannot be represented as `Value::Int`; they saturate.
// The allocator never hands out such IDs.
fn id_to_int(id: CallId) -> i64 {
    i64::try_from(id.0).unwrap_or(i64::MAX)
}
