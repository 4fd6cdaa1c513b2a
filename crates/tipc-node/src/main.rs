//! # TIPC Node
//!
//! Runs the coordinator/worker demo.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging, metrics)
//! 2. Load configuration (defaults, `TIPC_CONFIG`, environment)
//! 3. Create both channels and start both request handlers
//! 4. Run the demo until it completes or Ctrl+C arrives
//! 5. Shut down and optionally print metrics

use anyhow::{Context, Result};
use tipc_node::{NodeConfig, NodeRuntime};
use tipc_telemetry::{gather_text, init_telemetry, TelemetryConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_node("node"))
        .context("Failed to initialize telemetry")?;

    let config = NodeConfig::load().context("Failed to load configuration")?;
    let print_metrics = config.print_metrics;

    let runtime = NodeRuntime::new(config).context("Failed to create node runtime")?;

    tokio::select! {
        result = runtime.run() => {
            let report = result.context("Demo failed")?;
            info!(
                pings = report.worker_pings.len(),
                do_thing = report.do_thing,
                "Demo complete"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            warn!("Interrupted, shutting down");
        }
    }

    for (channel, stats) in runtime.stats() {
        info!(
            channel = %channel,
            sent = stats.correlation.registered,
            settled = stats.correlation.settled,
            orphaned = stats.correlation.orphaned,
            handled = stats.calls_handled,
            "Channel summary"
        );
    }
    runtime.shutdown();

    if print_metrics {
        println!("{}", gather_text().context("Failed to render metrics")?);
    }
    Ok(())
}
