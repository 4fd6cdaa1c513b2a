//! # Node Configuration
//!
//! Loaded in three layers, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file named by `TIPC_CONFIG` (optional)
//! 3. Environment overrides: `TIPC_PREFIX`, `TIPC_TIMEOUT_MS`, `TIPC_TRANSPORT`
//!
//! ```toml
//! transport = "pipe"
//! exit_delay_ms = 2000
//!
//! [channel]
//! prefix = "::tipc::"
//! default_timeout_ms = 5000
//! transformer = "tagged"
//!
//! [worker]
//! ping_delay_ms = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tipc_core::{ChannelConfig, ConfigError};

/// How the two peers are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process message queues.
    #[default]
    Memory,
    /// Newline-delimited text over an in-process byte pipe.
    Pipe,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(TransportKind::Memory),
            "pipe" => Ok(TransportKind::Pipe),
            other => Err(format!("unknown transport `{other}`")),
        }
    }
}

/// Worker behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// How long the worker's `ping` takes to answer.
    pub ping_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            ping_delay_ms: 1000,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Settings shared by both channel ends. Names are assigned per side.
    pub channel: ChannelConfig,
    /// Link between coordinator and worker.
    pub transport: TransportKind,
    /// Worker behaviour.
    pub worker: WorkerConfig,
    /// Delay before the coordinator tells the worker to exit.
    pub exit_delay_ms: u64,
    /// Print Prometheus metrics on shutdown.
    pub print_metrics: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            transport: TransportKind::default(),
            worker: WorkerConfig::default(),
            exit_delay_ms: 2000,
            print_metrics: false,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid channel config: {0}")]
    Channel(#[from] ConfigError),
}

impl NodeConfig {
    /// Defaults, then `TIPC_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self, NodeConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        let mut config = match lookup("TIPC_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NodeConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| NodeConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, NodeConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TIPC_PREFIX`, `TIPC_TIMEOUT_MS` and `TIPC_TRANSPORT`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), NodeConfigError> {
        if let Some(prefix) = lookup("TIPC_PREFIX") {
            self.channel.prefix = prefix;
        }
        if let Some(value) = lookup("TIPC_TIMEOUT_MS") {
            let ms = value.parse::<u64>().map_err(|e| NodeConfigError::InvalidEnv {
                var: "TIPC_TIMEOUT_MS",
                value: value.clone(),
                reason: e.to_string(),
            })?;
            self.channel.default_timeout_ms = Some(ms);
        }
        if let Some(value) = lookup("TIPC_TRANSPORT") {
            self.transport = value
                .parse()
                .map_err(|reason| NodeConfigError::InvalidEnv {
                    var: "TIPC_TRANSPORT",
                    value: value.clone(),
                    reason,
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), NodeConfigError> {
        Ok(self.channel.validate()?)
    }

    /// Channel config for one side, labelled `name`.
    #[must_use]
    pub fn channel_for(&self, name: &str) -> ChannelConfig {
        ChannelConfig {
            name: name.to_string(),
            ..self.channel.clone()
        }
    }

    #[must_use]
    pub fn ping_delay(&self) -> Duration {
        Duration::from_millis(self.worker.ping_delay_ms)
    }

    #[must_use]
    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms)
    }
}
