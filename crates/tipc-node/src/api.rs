//! Payloads and typed stubs for the coordinator and worker procedures.

use chrono::{DateTime, Utc};
use tipc_types::{expect_object, take_field, FromValue, Value, ValueError};

/// Answer to the coordinator's `ping`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorPing {
    pub date: DateTime<Utc>,
    pub on: String,
}

impl From<CoordinatorPing> for Value {
    fn from(ping: CoordinatorPing) -> Self {
        Value::object([("date", Value::from(ping.date)), ("on", Value::from(ping.on))])
    }
}

impl FromValue for CoordinatorPing {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        let mut map = expect_object(value)?;
        Ok(Self {
            date: take_field(&mut map, "date")?,
            on: take_field(&mut map, "on")?,
        })
    }
}

/// Answer to the worker's `ping`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPing {
    pub date: DateTime<Utc>,
    /// How many pings this worker has answered, including this one.
    pub counter: u64,
}

impl From<WorkerPing> for Value {
    fn from(ping: WorkerPing) -> Self {
        let counter = i64::try_from(ping.counter).unwrap_or(i64::MAX);
        Value::object([
            ("date", Value::from(ping.date)),
            ("counter", Value::Int(counter)),
        ])
    }
}

impl FromValue for WorkerPing {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        let mut map = expect_object(value)?;
        Ok(Self {
            date: take_field(&mut map, "date")?,
            counter: take_field(&mut map, "counter")?,
        })
    }
}

tipc_core::remote_api! {
    /// Procedures served by the coordinator.
    pub struct CoordinatorApi {
        query ping("ping"): () => CoordinatorPing;
        query yee("woah.nested.yee"): () => Value;
    }
}

tipc_core::remote_api! {
    /// Procedures served by a worker.
    pub struct WorkerApi {
        query ping("ping"): () => WorkerPing;
        mutation do_thing("doThing"): () => i64;
        /// Ask the worker to shut down. Resolves once the worker has acknowledged.
        mutation exit("exit"): () => ();
    }
}
