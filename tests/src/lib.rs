//! # TIPC Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs    # Request/response flows between two peers
//!     ├── robustness.rs   # Orphans, garbage, timeouts, teardown
//!     └── transports.rs   # Line transport, bidirectional calls, value fidelity
//!
//! tests/benches/
//! └── protocol_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p tipc-tests
//!
//! # By category
//! cargo test -p tipc-tests integration::scenarios::
//!
//! # Benchmarks
//! cargo bench -p tipc-tests
//! ```

pub mod integration;

use std::time::Duration;
use tipc_core::codec::FrameRef;
use tipc_core::transport::memory::{self, MemoryReceiver, MemorySender};
use tipc_core::{Channel, ChannelConfig, FrameReceiver, Operation, RawMessage};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(2);

/// A channel whose far end is driven by hand.
pub struct RawPeer {
    pub channel: Channel,
    pub tx: MemorySender,
    pub rx: MemoryReceiver,
}

impl RawPeer {
    pub fn new(name: &str) -> Self {
        Self::with_config(ChannelConfig::named(name))
    }

    pub fn with_config(config: ChannelConfig) -> Self {
        let (a, b) = memory::pair();
        let (a_tx, a_rx) = a.into_parts();
        let (tx, rx) = b.into_parts();
        let channel = Channel::new(a_tx, a_rx, config)
            .unwrap_or_else(|e| panic!("channel setup failed: {e}"));
        Self { channel, tx, rx }
    }

    /// Next raw message the channel sent.
    pub async fn next_message(&mut self) -> RawMessage {
        match tokio::time::timeout(WAIT, self.rx.receive()).await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => panic!("transport failed: {e}"),
            Err(_) => panic!("no message within {WAIT:?}"),
        }
    }

    /// Next call frame the channel sent, decoded.
    pub async fn next_call(&mut self) -> Operation {
        let message = self.next_message().await;
        let codec = self.channel.codec();
        match codec.classify(&message) {
            Ok(FrameRef::Call { body }) => codec
                .decode_call(body)
                .unwrap_or_else(|e| panic!("bad call frame: {e}")),
            other => panic!("expected a call frame, got {other:?}"),
        }
    }
}

/// Two channels connected in memory.
pub fn peers(left: &str, right: &str) -> (Channel, Channel) {
    Channel::memory_pair(ChannelConfig::named(left), ChannelConfig::named(right))
        .unwrap_or_else(|e| panic!("channel setup failed: {e}"))
}
