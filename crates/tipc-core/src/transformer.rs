//! # Value Transformers
//!
//! A transformer maps a [`Value`] to the JSON that travels inside a frame and back.
//!
//! [`TaggedJson`] is lossless. It emits an envelope
//!
//! ```text
//! {"json": <plain json>, "meta": {"values": {"$.date": "Date", "$.ratio": "number"}}}
//! ```
//!
//! where each `meta.values` key is a path into `json` (`$` is the root, segments
//! are joined by `.`, literal `.` and `\` in keys are backslash-escaped) and the
//! value names the type the plain JSON node must be restored to. `meta` is
//! omitted when nothing needed a tag.

use chrono::{DateTime, Utc};
use tipc_types::{format_timestamp, Value};
use thiserror::Error;

const TAG_DATE: &str = "Date";
const TAG_NUMBER: &str = "number";
const ROOT: &str = "$";

/// Transformer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The wire value is not a `{json, meta}` envelope.
    #[error("not a tagged envelope: {0}")]
    NotAnEnvelope(String),

    /// A meta path could not be parsed or does not point into the payload.
    #[error("invalid meta path `{0}`")]
    InvalidPath(String),

    /// A meta tag is not one this transformer understands.
    #[error("unknown type tag `{tag}` at `{path}`")]
    UnknownTag { path: String, tag: String },

    /// The tagged node could not be restored.
    #[error("cannot restore `{path}`: {reason}")]
    InvalidTaggedValue { path: String, reason: String },
}

/// Pluggable value codec.
pub trait Transformer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Value to wire JSON.
    fn serialize(&self, value: &Value) -> Result<serde_json::Value, TransformError>;

    /// Wire JSON back to a value.
    fn deserialize(&self, wire: serde_json::Value) -> Result<Value, TransformError>;
}

/// Plain JSON. Lossy for timestamps and non-finite floats.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainJson;

impl Transformer for PlainJson {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn serialize(&self, value: &Value) -> Result<serde_json::Value, TransformError> {
        Ok(value.to_json())
    }

    fn deserialize(&self, wire: serde_json::Value) -> Result<Value, TransformError> {
        Ok(Value::from(wire))
    }
}

/// Lossless JSON with type annotations for extended scalars.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedJson;

impl Transformer for TaggedJson {
    fn name(&self) -> &'static str {
        "tagged"
    }

    fn serialize(&self, value: &Value) -> Result<serde_json::Value, TransformError> {
        let mut tags = serde_json::Map::new();
        let mut path = vec![];
        let json = encode_tagged(value, &mut path, &mut tags);

        let mut envelope = serde_json::Map::new();
        envelope.insert("json".into(), json);
        if !tags.is_empty() {
            let mut meta = serde_json::Map::new();
            meta.insert("values".into(), serde_json::Value::Object(tags));
            envelope.insert("meta".into(), serde_json::Value::Object(meta));
        }
        Ok(serde_json::Value::Object(envelope))
    }

    fn deserialize(&self, wire: serde_json::Value) -> Result<Value, TransformError> {
        let serde_json::Value::Object(mut envelope) = wire else {
            return Err(TransformError::NotAnEnvelope("expected an object".into()));
        };
        let json = envelope
            .remove("json")
            .ok_or_else(|| TransformError::NotAnEnvelope("missing `json`".into()))?;
        let mut value = Value::from(json);

        let Some(meta) = envelope.remove("meta") else {
            return Ok(value);
        };
        let tags = match meta {
            serde_json::Value::Object(mut meta) => match meta.remove("values") {
                Some(serde_json::Value::Object(tags)) => tags,
                None => return Ok(value),
                Some(_) => {
                    return Err(TransformError::NotAnEnvelope(
                        "`meta.values` must be an object".into(),
                    ))
                }
            },
            _ => return Err(TransformError::NotAnEnvelope("`meta` must be an object".into())),
        };

        for (path, tag) in tags {
            let tag = tag.as_str().ok_or_else(|| TransformError::UnknownTag {
                path: path.clone(),
                tag: tag.to_string(),
            })?;
            let segments = parse_path(&path)?;
            let node = locate(&mut value, &segments)
                .ok_or_else(|| TransformError::InvalidPath(path.clone()))?;
            restore(node, tag, &path)?;
        }
        Ok(value)
    }
}

fn encode_tagged(
    value: &Value,
    path: &mut Vec<String>,
    tags: &mut serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    match value {
        Value::Timestamp(ts) => {
            tags.insert(render_path(path), TAG_DATE.into());
            serde_json::Value::String(format_timestamp(ts))
        }
        Value::Float(f) if !f.is_finite() => {
            tags.insert(render_path(path), TAG_NUMBER.into());
            serde_json::Value::String(non_finite_name(*f).into())
        }
        Value::Array(items) => serde_json::Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    path.push(i.to_string());
                    let json = encode_tagged(item, path, tags);
                    path.pop();
                    json
                })
                .collect(),
        ),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| {
                    path.push(k.clone());
                    let json = encode_tagged(v, path, tags);
                    path.pop();
                    (k.clone(), json)
                })
                .collect(),
        ),
        scalar => scalar.to_json(),
    }
}

fn non_finite_name(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn render_path(segments: &[String]) -> String {
    let mut out = String::from(ROOT);
    for segment in segments {
        out.push('.');
        for c in segment.chars() {
            if c == '.' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

fn parse_path(path: &str) -> Result<Vec<String>, TransformError> {
    let invalid = || TransformError::InvalidPath(path.to_string());
    let rest = path.strip_prefix(ROOT).ok_or_else(invalid)?;
    if rest.is_empty() {
        return Ok(vec![]);
    }
    let rest = rest.strip_prefix('.').ok_or_else(invalid)?;

    let mut segments = vec![];
    let mut current = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().ok_or_else(invalid)?),
            '.' => segments.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    segments.push(current);
    Ok(segments)
}

fn locate<'a>(value: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut node = value;
    for segment in segments {
        node = match node {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

fn restore(node: &mut Value, tag: &str, path: &str) -> Result<(), TransformError> {
    let invalid = |reason: String| TransformError::InvalidTaggedValue {
        path: path.to_string(),
        reason,
    };
    let Value::String(raw) = node else {
        return Err(invalid(format!("expected string, found {}", node.type_name())));
    };
    let restored = match tag {
        TAG_DATE => {
            let ts = DateTime::parse_from_rfc3339(raw).map_err(|e| invalid(e.to_string()))?;
            Value::Timestamp(ts.with_timezone(&Utc))
        }
        TAG_NUMBER => match raw.as_str() {
            "NaN" => Value::Float(f64::NAN),
            "Infinity" => Value::Float(f64::INFINITY),
            "-Infinity" => Value::Float(f64::NEG_INFINITY),
            other => return Err(invalid(format!("not a special number: {other}"))),
        },
        other => {
            return Err(TransformError::UnknownTag {
                path: path.to_string(),
                tag: other.to_string(),
            })
        }
    };
    *node = restored;
    Ok(())
}
