//! # Transports and Value Fidelity
//!
//! The protocol over a newline-delimited byte pipe, both peers calling each
//! other at once, and what survives the trip under each transformer.

#[cfg(test)]
mod tests {
    use crate::WAIT;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use tipc_core::transport::lines;
    use tipc_core::{
        CallError, CallKind, CallOptions, Channel, ChannelConfig, HandlerOptions, Outcome,
        ProcedureRouter, Proxy, RouterError, TransformerKind, Value,
    };
    use tipc_node::worker::{self, WorkerState};
    use tipc_node::WorkerApi;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::timeout;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// Two channels linked by an in-process byte pipe carrying one frame per line.
    fn piped(left: ChannelConfig, right: ChannelConfig) -> (Channel, Channel) {
        let (a, b) = tokio::io::duplex(4096);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        let (a_tx, a_rx) = lines::split(a_read, a_write);
        let (b_tx, b_rx) = lines::split(b_read, b_write);
        (
            Channel::new(a_tx, a_rx, left).unwrap(),
            Channel::new(b_tx, b_rx, right).unwrap(),
        )
    }

    fn echo_router() -> ProcedureRouter {
        ProcedureRouter::new().query("echo", |_, input: Value| async move {
            Ok::<_, RouterError>(input)
        })
    }

    fn sample() -> Value {
        let date = Utc
            .timestamp_opt(1_700_000_000, 123_456_789)
            .single()
            .unwrap();
        Value::object([
            ("date", Value::Timestamp(date)),
            ("text", Value::from("multi\nline")),
            ("big", Value::Float(f64::INFINITY)),
            ("list", Value::Array(vec![Value::Int(1), Value::Null])),
        ])
    }

    // =========================================================================
    // LINE TRANSPORT
    // =========================================================================

    #[tokio::test]
    async fn test_calls_over_byte_pipe() {
        let (caller, server) = piped(ChannelConfig::named("caller"), ChannelConfig::named("server"));
        let _handler = server.serve(echo_router(), HandlerOptions::default()).unwrap();

        let out = timeout(WAIT, caller.client().query("echo", sample()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, sample());
        assert_eq!(
            out.get("date")
                .and_then(Value::as_timestamp)
                .unwrap()
                .timestamp_subsec_nanos(),
            123_456_789
        );
    }

    #[tokio::test]
    async fn test_both_peers_call_each_other() {
        let (left, right) = piped(ChannelConfig::named("left"), ChannelConfig::named("right"));
        let named = |name: &'static str| {
            ProcedureRouter::new().query("name", move |_, _| async move {
                Ok::<_, RouterError>(name)
            })
        };
        let _left_handler = left.serve(named("left"), HandlerOptions::default()).unwrap();
        let _right_handler = right.serve(named("right"), HandlerOptions::default()).unwrap();

        let left_client = left.client();
        let right_client = right.client();
        let (from_right, from_left) = tokio::join!(
            left_client.query("name", ()),
            right_client.query("name", ()),
        );
        assert_eq!(from_right.unwrap(), Value::from("right"));
        assert_eq!(from_left.unwrap(), Value::from("left"));

        // Each side saw its own result and the other side's call.
        for channel in [&left, &right] {
            let stats = channel.stats();
            assert_eq!(stats.calls_handled, 1);
            assert_eq!(stats.correlation.settled, 1);
            assert_eq!(stats.malformed, 0);
        }
    }

    #[tokio::test]
    async fn test_binary_noise_on_pipe_is_ignored() {
        let (near, far) = tokio::io::duplex(4096);
        let (near_read, near_write) = tokio::io::split(near);
        let (near_tx, near_rx) = lines::split(near_read, near_write);
        let channel = Channel::new(near_tx, near_rx, ChannelConfig::named("caller")).unwrap();
        let (far_read, mut far_write) = tokio::io::split(far);
        let mut far_lines = BufReader::new(far_read).lines();

        let reply = channel
            .client()
            .dispatch(CallKind::Query, "ping", Value::Null, CallOptions::default())
            .await
            .unwrap();
        let sent = timeout(WAIT, far_lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(sent.starts_with("::tipc::call::"));

        let answer = channel
            .codec()
            .encode_result(reply.id(), &Outcome::Data(Value::Int(1)))
            .unwrap();
        far_write.write_all(b"\xff\xfe noise\n").await.unwrap();
        far_write
            .write_all(format!("{answer}\n").as_bytes())
            .await
            .unwrap();

        let outcome = timeout(WAIT, reply.wait()).await.unwrap();
        assert_eq!(outcome, Ok(Outcome::Data(Value::Int(1))));
        assert!(!channel.is_closed());
        let stats = channel.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.malformed, 0);
    }

    #[tokio::test]
    async fn test_pipe_closure_closes_channel() {
        let (caller, server) = piped(ChannelConfig::named("caller"), ChannelConfig::named("server"));
        drop(server);

        timeout(WAIT, caller.closed()).await.unwrap();
        assert_eq!(
            caller.client().query("echo", ()).await,
            Err(CallError::ChannelClosed)
        );
    }

    // =========================================================================
    // TRANSFORMERS AND PREFIXES
    // =========================================================================

    #[tokio::test]
    async fn test_plain_transformer_flattens_rich_values() {
        let plain = |name: &str| ChannelConfig::named(name).with_transformer(TransformerKind::Plain);
        let (caller, server) = Channel::memory_pair(plain("caller"), plain("server")).unwrap();
        let _handler = server.serve(echo_router(), HandlerOptions::default()).unwrap();

        let out = caller.client().query("echo", sample()).await.unwrap();
        assert_eq!(
            out.get("date"),
            Some(&Value::from("2023-11-14T22:13:20.123456789Z"))
        );
        assert_eq!(out.get("big"), Some(&Value::Null));
        assert_eq!(out.get("text"), Some(&Value::from("multi\nline")));
    }

    #[tokio::test]
    async fn test_mismatched_prefixes_never_meet() {
        let (caller, server) = Channel::memory_pair(
            ChannelConfig::named("caller").with_prefix("::left::"),
            ChannelConfig::named("server").with_prefix("::right::"),
        )
        .unwrap();
        let _handler = server.serve(echo_router(), HandlerOptions::default()).unwrap();

        let err = caller
            .client()
            .call(
                CallKind::Query,
                "echo",
                Value::Null,
                CallOptions::default().with_timeout(Duration::from_millis(30)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CallError::TimedOut(30));
        assert_eq!(server.stats().calls_handled, 0);
    }

    // =========================================================================
    // TYPED STUBS
    // =========================================================================

    #[tokio::test]
    async fn test_worker_stub_over_byte_pipe() {
        let (coordinator, worker_channel) = piped(
            ChannelConfig::named("coordinator"),
            ChannelConfig::named("worker"),
        );
        let state = Arc::new(WorkerState::new("worker-1", Duration::ZERO));
        let _handler = worker_channel.serve(
            worker::router(Arc::clone(&state)),
            HandlerOptions::default(),
        )
        .unwrap();
        let api = WorkerApi::new(Proxy::new(coordinator.client()));

        let first = api.ping(()).await.unwrap();
        let second = api.ping(()).await.unwrap();
        assert_eq!((first.counter, second.counter), (1, 2));
        assert!(second.date >= first.date);
        assert_eq!(api.do_thing(()).await.unwrap(), 5);

        api.exit(()).await.unwrap();
        timeout(WAIT, state.exited()).await.unwrap();
        assert_eq!(state.pings(), 2);
    }
}
