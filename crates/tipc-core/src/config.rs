//! # Channel Configuration
//!
//! All protocol knobs are explicit values threaded through `Channel`
//! construction; there is no ambient codec or global state.

use crate::transformer::{PlainJson, TaggedJson, Transformer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default frame tag prefix.
pub const DEFAULT_PREFIX: &str = "::tipc::";

/// Which value transformer a channel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformerKind {
    /// Lossless, with type tags for extended scalars.
    #[default]
    Tagged,
    /// Plain JSON. Timestamps degrade to strings.
    Plain,
}

impl TransformerKind {
    #[must_use]
    pub fn build(self) -> Arc<dyn Transformer> {
        match self {
            TransformerKind::Tagged => Arc::new(TaggedJson),
            TransformerKind::Plain => Arc::new(PlainJson),
        }
    }
}

/// Per-channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Label used in log fields, e.g. `coordinator` or `worker-1`.
    pub name: String,
    /// Tag prefix shared by call and result frames.
    pub prefix: String,
    /// Deadline applied to calls that do not set their own. `None` waits forever.
    pub default_timeout_ms: Option<u64>,
    /// When set, expired pending calls are swept at this interval.
    pub sweep_interval_ms: Option<u64>,
    /// Value transformer.
    pub transformer: TransformerKind,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "channel".to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            default_timeout_ms: None,
            sweep_interval_ms: None,
            transformer: TransformerKind::default(),
        }
    }
}

impl ChannelConfig {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = Some(duration_ms(timeout));
        self
    }

    #[must_use]
    pub fn with_transformer(mut self, kind: TransformerKind) -> Self {
        self.transformer = kind;
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_ms.map(Duration::from_millis)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.prefix.contains('\n') || self.prefix.chars().all(|c| c == ':') {
            return Err(ConfigError::InvalidPrefix(self.prefix.clone()));
        }
        if self.default_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroDuration("default_timeout_ms"));
        }
        if self.sweep_interval_ms == Some(0) {
            return Err(ConfigError::ZeroDuration("sweep_interval_ms"));
        }
        Ok(())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("frame prefix cannot be empty")]
    EmptyPrefix,

    #[error("invalid frame prefix {0:?}")]
    InvalidPrefix(String),

    #[error("{0} cannot be 0")]
    ZeroDuration(&'static str),
}
