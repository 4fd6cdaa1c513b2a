//! # Node Runtime
//!
//! Wires a coordinator and one worker together over a single duplex link.
//! Each side serves its own router and holds a typed stub for the other.
//!
//! ```text
//! coordinator channel ←──── one link ────→ worker channel
//!   serves: ping, woah.nested.yee            serves: ping, doThing, exit
//!   calls:  WorkerApi                        calls:  CoordinatorApi
//! ```
//!
//! ## Demo sequence
//!
//! 1. The worker pings the coordinator
//! 2. The coordinator pings the worker twice, concurrently
//! 3. The coordinator calls `doThing`
//! 4. After `exit_delay`, the coordinator calls `exit` and waits for the worker to stop

use crate::api::{CoordinatorApi, CoordinatorPing, WorkerApi, WorkerPing};
use crate::config::{NodeConfig, TransportKind};
use crate::coordinator;
use crate::worker::{self, WorkerState};
use std::sync::Arc;
use thiserror::Error;
use tipc_core::transport::lines;
use tipc_core::{
    CallError, Channel, ChannelStats, ConfigError, HandlerOptions, Proxy, ServeError,
    ServeHandle,
};
use tipc_telemetry::ChannelMetrics;
use tipc_types::Value;
use tracing::info;

/// Buffer size of the in-process byte pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("channel setup failed: {0}")]
    Channel(#[from] ConfigError),

    #[error("request handler failed to start: {0}")]
    Serve(#[from] ServeError),

    #[error("{step} failed: {source}")]
    Call {
        step: &'static str,
        #[source]
        source: CallError,
    },
}

fn step(step: &'static str) -> impl FnOnce(CallError) -> NodeError {
    move |source| NodeError::Call { step, source }
}

/// What the demo observed.
#[derive(Debug, Clone)]
pub struct DemoReport {
    /// The worker's view of the coordinator.
    pub coordinator_ping: CoordinatorPing,
    /// The coordinator's two concurrent pings of the worker.
    pub worker_pings: [WorkerPing; 2],
    pub do_thing: i64,
    pub nested: Value,
}

/// Both peers of the demo, running in this process.
pub struct NodeRuntime {
    config: NodeConfig,
    coordinator: Channel,
    worker: Channel,
    worker_state: Arc<WorkerState>,
    handlers: Vec<ServeHandle>,
    metrics: [ChannelMetrics; 2],
}

impl NodeRuntime {
    /// Create both channels and start both request handlers.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let coordinator_config = config.channel_for("coordinator");
        let worker_config = config.channel_for("worker");

        let (coordinator, worker) = match config.transport {
            TransportKind::Memory => Channel::memory_pair(coordinator_config, worker_config)?,
            TransportKind::Pipe => {
                let (a, b) = tokio::io::duplex(PIPE_CAPACITY);
                let (a_read, a_write) = tokio::io::split(a);
                let (b_read, b_write) = tokio::io::split(b);
                let (a_tx, a_rx) = lines::split(a_read, a_write);
                let (b_tx, b_rx) = lines::split(b_read, b_write);
                (
                    Channel::new(a_tx, a_rx, coordinator_config)?,
                    Channel::new(b_tx, b_rx, worker_config)?,
                )
            }
        };

        let worker_state = Arc::new(WorkerState::new("worker-1", config.ping_delay()));
        let handlers = vec![
            coordinator.serve(
                coordinator::router(),
                HandlerOptions::with_context(Value::object([(
                    "worker",
                    Value::from(worker_state.name()),
                )])),
            )?,
            worker.serve(
                worker::router(Arc::clone(&worker_state)),
                HandlerOptions::with_context(Value::object([(
                    "from",
                    Value::from(coordinator::COORDINATOR_NAME),
                )])),
            )?,
        ];

        info!(
            transport = ?config.transport,
            prefix = %config.channel.prefix,
            transformer = ?config.channel.transformer,
            "Node runtime created"
        );

        Ok(Self {
            metrics: [
                ChannelMetrics::new(coordinator.name()),
                ChannelMetrics::new(worker.name()),
            ],
            config,
            coordinator,
            worker,
            worker_state,
            handlers,
        })
    }

    /// Typed stub the coordinator uses to call the worker.
    #[must_use]
    pub fn worker_api(&self) -> WorkerApi {
        WorkerApi::new(Proxy::new(self.coordinator.client()))
    }

    /// Typed stub the worker uses to call the coordinator.
    #[must_use]
    pub fn coordinator_api(&self) -> CoordinatorApi {
        CoordinatorApi::new(Proxy::new(self.worker.client()))
    }

    #[must_use]
    pub fn worker_state(&self) -> &WorkerState {
        &self.worker_state
    }

    /// Run the demo sequence to completion.
    pub async fn run(&self) -> Result<DemoReport, NodeError> {
        let coordinator_api = self.coordinator_api();
        let worker_api = self.worker_api();

        let coordinator_ping = coordinator_api.ping(()).await.map_err(step("worker ping"))?;
        info!(date = %coordinator_ping.date, on = %coordinator_ping.on, "Worker got coordinator ping");

        let nested = coordinator_api.yee(()).await.map_err(step("nested query"))?;

        let (first, second) = futures::join!(worker_api.ping(()), worker_api.ping(()));
        let worker_pings = [
            first.map_err(step("coordinator ping"))?,
            second.map_err(step("coordinator ping"))?,
        ];
        for ping in &worker_pings {
            info!(date = %ping.date, counter = ping.counter, "Coordinator got worker ping");
        }

        let do_thing = worker_api.do_thing(()).await.map_err(step("doThing"))?;
        info!(result = do_thing, "doThing answered");

        tokio::time::sleep(self.config.exit_delay()).await;
        info!("Asking worker to exit");
        worker_api.exit(()).await.map_err(step("exit"))?;
        self.worker_state.exited().await;

        Ok(DemoReport {
            coordinator_ping,
            worker_pings,
            do_thing,
            nested,
        })
    }

    /// Current counters for both channels.
    #[must_use]
    pub fn stats(&self) -> [(String, ChannelStats); 2] {
        [
            (self.coordinator.name().to_string(), self.coordinator.stats()),
            (self.worker.name().to_string(), self.worker.stats()),
        ]
    }

    /// Copy channel counters into the Prometheus collectors.
    pub fn observe_metrics(&self) {
        self.metrics[0].observe(&self.coordinator.stats());
        self.metrics[1].observe(&self.worker.stats());
    }

    /// Stop both handlers and close both channels.
    pub fn shutdown(self) {
        self.observe_metrics();
        for handle in self.handlers {
            handle.shutdown();
        }
        self.coordinator.close();
        self.worker.close();
        info!("Node runtime stopped");
    }
}
