//! Prometheus metrics for TIPC channels.
//!
//! All metrics follow the naming convention `tipc_<metric>[_total]` and carry a
//! `channel` label.
//!
//! Channels keep their own atomic counters ([`ChannelStats`]); a
//! [`ChannelMetrics`] copies them into the global registry on `observe()`.

use crate::TelemetryError;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tipc_core::ChannelStats;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // OUTBOUND CALLS
    // =========================================================================

    /// Calls registered and sent
    pub static ref CALLS_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("tipc_calls_sent_total", "Total calls dispatched"),
        &["channel"]
    ).expect("metric creation failed");

    /// Calls settled by a result frame
    pub static ref CALLS_SETTLED: IntCounterVec = IntCounterVec::new(
        Opts::new("tipc_calls_settled_total", "Total calls settled by a matching result"),
        &["channel"]
    ).expect("metric creation failed");

    /// Calls that ended without a result
    pub static ref CALLS_ABANDONED: IntCounterVec = IntCounterVec::new(
        Opts::new("tipc_calls_abandoned_total", "Calls that ended without a result"),
        &["channel", "reason"]  // reason: cancelled/timed_out/channel_closed
    ).expect("metric creation failed");

    /// Calls currently outstanding
    pub static ref PENDING_CALLS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("tipc_pending_calls", "Calls awaiting a result"),
        &["channel"]
    ).expect("metric creation failed");

    // =========================================================================
    // INBOUND TRAFFIC
    // =========================================================================

    /// Result frames that matched no pending call
    pub static ref ORPHAN_RESULTS: IntCounterVec = IntCounterVec::new(
        Opts::new("tipc_orphan_results_total", "Result frames with no matching pending call"),
        &["channel"]
    ).expect("metric creation failed");

    /// Frames carrying a protocol tag that failed to decode
    pub static ref MALFORMED_FRAMES: IntCounterVec = IntCounterVec::new(
        Opts::new("tipc_malformed_frames_total", "Protocol frames that failed to decode"),
        &["channel"]
    ).expect("metric creation failed");

    /// Inbound calls answered
    pub static ref CALLS_HANDLED: IntCounterVec = IntCounterVec::new(
        Opts::new("tipc_calls_handled_total", "Inbound calls answered"),
        &["channel"]
    ).expect("metric creation failed");

    /// Inbound calls answered with an error outcome
    pub static ref ROUTER_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("tipc_router_errors_total", "Inbound calls answered with an error"),
        &["channel"]
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    /// Raw messages by direction
    pub static ref FRAMES: IntCounterVec = IntCounterVec::new(
        Opts::new("tipc_frames_total", "Messages moved over the transport"),
        &["channel", "direction"]  // direction: sent/received
    ).expect("metric creation failed");
}

/// Register all collectors with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Outbound
        Box::new(CALLS_SENT.clone()),
        Box::new(CALLS_SETTLED.clone()),
        Box::new(CALLS_ABANDONED.clone()),
        Box::new(PENDING_CALLS.clone()),
        // Inbound
        Box::new(ORPHAN_RESULTS.clone()),
        Box::new(MALFORMED_FRAMES.clone()),
        Box::new(CALLS_HANDLED.clone()),
        Box::new(ROUTER_ERRORS.clone()),
        // Transport
        Box::new(FRAMES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render every registered metric in the Prometheus text format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Feeds one channel's counters into the global collectors.
#[derive(Debug)]
pub struct ChannelMetrics {
    channel: String,
    last: Mutex<ChannelStats>,
}

impl ChannelMetrics {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            last: Mutex::new(ChannelStats::default()),
        }
    }

    /// Record everything that happened since the previous `observe()`.
    pub fn observe(&self, stats: &ChannelStats) {
        let mut last = self.last.lock();
        let channel = self.channel.as_str();
        let delta = |now: u64, before: u64| now.saturating_sub(before);

        let (c, l) = (&stats.correlation, &last.correlation);
        CALLS_SENT
            .with_label_values(&[channel])
            .inc_by(delta(c.registered, l.registered));
        CALLS_SETTLED
            .with_label_values(&[channel])
            .inc_by(delta(c.settled, l.settled));
        ORPHAN_RESULTS
            .with_label_values(&[channel])
            .inc_by(delta(c.orphaned, l.orphaned));
        for (reason, now, before) in [
            ("cancelled", c.cancelled, l.cancelled),
            ("timed_out", c.timed_out, l.timed_out),
            ("channel_closed", c.failed, l.failed),
        ] {
            CALLS_ABANDONED
                .with_label_values(&[channel, reason])
                .inc_by(delta(now, before));
        }

        MALFORMED_FRAMES
            .with_label_values(&[channel])
            .inc_by(delta(stats.malformed, last.malformed));
        CALLS_HANDLED
            .with_label_values(&[channel])
            .inc_by(delta(stats.calls_handled, last.calls_handled));
        ROUTER_ERRORS
            .with_label_values(&[channel])
            .inc_by(delta(stats.router_errors, last.router_errors));
        FRAMES
            .with_label_values(&[channel, "sent"])
            .inc_by(delta(stats.frames_sent, last.frames_sent));
        FRAMES
            .with_label_values(&[channel, "received"])
            .inc_by(delta(stats.frames_received, last.frames_received));

        PENDING_CALLS
            .with_label_values(&[channel])
            .set(i64::try_from(stats.pending).unwrap_or(i64::MAX));

        *last = *stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tipc_core::StatsSnapshot;

    fn stats(registered: u64, orphaned: u64, pending: usize) -> ChannelStats {
        ChannelStats {
            frames_sent: registered,
            pending,
            correlation: StatsSnapshot {
                registered,
                orphaned,
                ..StatsSnapshot::default()
            },
            ..ChannelStats::default()
        }
    }

    #[test]
    fn test_register_metrics_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_observe_records_deltas() {
        let metrics = ChannelMetrics::new("metrics-test-deltas");

        metrics.observe(&stats(3, 1, 2));
        metrics.observe(&stats(5, 1, 0));

        let sent = CALLS_SENT.with_label_values(&["metrics-test-deltas"]).get();
        let orphans = ORPHAN_RESULTS
            .with_label_values(&["metrics-test-deltas"])
            .get();
        let pending = PENDING_CALLS
            .with_label_values(&["metrics-test-deltas"])
            .get();
        assert_eq!(sent, 5);
        assert_eq!(orphans, 1);
        assert_eq!(pending, 0);
    }

    #[test]
    fn test_gather_text_contains_channel() {
        register_metrics().unwrap();
        ChannelMetrics::new("metrics-test-text").observe(&stats(1, 0, 1));

        let text = gather_text().unwrap();
        assert!(text.contains("tipc_calls_sent_total"));
        assert!(text.contains("metrics-test-text"));
    }
}
