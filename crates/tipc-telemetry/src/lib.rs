//! # TIPC Telemetry
//!
//! Logging and metrics for processes that run TIPC channels.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tipc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TIPC_SERVICE_NAME` | `tipc` | Service name in logs |
//! | `TIPC_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `TIPC_JSON_LOGS` | `false` | JSON log lines |
//! | `TIPC_METRICS` | `true` | Register Prometheus collectors |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::{gather_text, register_metrics, ChannelMetrics};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, if enabled, metrics.
///
/// Hold the returned guard for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if config.metrics_enabled {
        register_metrics()?;
    }
    logging::init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        metrics = config.metrics_enabled,
        "Telemetry initialized"
    );
    Ok(TelemetryGuard { config })
}

/// Keeps telemetry active. Logs on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    config: TelemetryConfig,
}

impl TelemetryGuard {
    #[must_use]
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.config.service_name, "Shutting down telemetry");
    }
}
