//! # Error Types
//!
//! Errors raised while interpreting a `Value` as a typed shape.

use thiserror::Error;

/// A value did not have the shape a consumer expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value had the wrong type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A required object field was absent.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A field was present but invalid.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// A number did not fit the target type.
    #[error("number out of range for {0}")]
    OutOfRange(&'static str),
}

impl ValueError {
    /// Shorthand for a type mismatch against `found`.
    pub fn mismatch(expected: &'static str, found: &crate::Value) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }

    /// Prefix the error with the field it was found in.
    pub fn in_field(self, field: &str) -> Self {
        match self {
            Self::MissingField(inner) => Self::MissingField(format!("{field}.{inner}")),
            Self::InvalidField { field: inner, reason } => Self::InvalidField {
                field: format!("{field}.{inner}"),
                reason,
            },
            other => Self::InvalidField {
                field: field.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
