//! Typed views over `Value`.
//!
//! Proxy outputs are decoded through `FromValue`; inputs go the other way
//! through the standard `Into<Value>`.

use crate::errors::ValueError;
use crate::value::{Map, Value};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Fallible conversion out of a `Value`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl FromValue for () {
    /// Accepts anything: a unit output ignores whatever the peer returned.
    fn from_value(_: Value) -> Result<Self, ValueError> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        value
            .as_bool()
            .ok_or_else(|| ValueError::mismatch("bool", &value))
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(i) => Ok(i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                if f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Ok(f as i64)
                } else {
                    Err(ValueError::OutOfRange("i64"))
                }
            }
            other => Err(ValueError::mismatch("int", &other)),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        let i = i64::from_value(value)?;
        u64::try_from(i).map_err(|_| ValueError::OutOfRange("u64"))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        value
            .as_f64()
            .ok_or_else(|| ValueError::mismatch("float", &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ValueError::mismatch("string", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    /// Also accepts RFC 3339 strings, which is how timestamps arrive over a
    /// plain JSON transformer.
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::String(s) => DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| ValueError::mismatch("timestamp", &Value::String(s))),
            other => Err(ValueError::mismatch("timestamp", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| T::from_value(item).map_err(|e| e.in_field(&i.to_string())))
                .collect(),
            other => Err(ValueError::mismatch("array", &other)),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let parsed = T::from_value(v).map_err(|e| e.in_field(&k))?;
                    Ok((k, parsed))
                })
                .collect(),
            other => Err(ValueError::mismatch("object", &other)),
        }
    }
}

/// Helper for hand-written `FromValue` impls on record types.
///
/// Removes and converts one field from an object map.
pub fn take_field<T: FromValue>(map: &mut Map, field: &str) -> Result<T, ValueError> {
    let value = map
        .remove(field)
        .ok_or_else(|| ValueError::MissingField(field.to_string()))?;
    T::from_value(value).map_err(|e| e.in_field(field))
}

/// Helper for hand-written `FromValue` impls: unwrap an object or fail.
pub fn expect_object(value: Value) -> Result<Map, ValueError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValueError::mismatch("object", &other)),
    }
}
