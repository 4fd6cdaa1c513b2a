//! # Robustness
//!
//! Whatever arrives on the link, the channel keeps running: garbage and stray
//! results are absorbed, unanswered calls wait until a deadline or a cancel,
//! and teardown fails everything still pending.

#[cfg(test)]
mod tests {
    use crate::{peers, RawPeer, WAIT};
    use std::future::IntoFuture;
    use std::time::Duration;
    use tipc_core::{
        CallError, CallId, CallKind, CallOptions, CancellationToken, Channel, ChannelConfig,
        FrameReceiver, FrameSender, HandlerOptions, Outcome, ProcedureRouter, RouterError, Value,
    };
    use tokio::time::timeout;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// Answers `slow` after 100ms.
    fn slow_server(server: &Channel) {
        let router = ProcedureRouter::new().query("slow", |_, _| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, RouterError>(Value::from("late"))
        });
        let _handler = server.serve(router, HandlerOptions::default()).unwrap();
    }

    /// Poll `check` until it holds or `WAIT` runs out.
    async fn eventually(check: impl Fn() -> bool) {
        timeout(WAIT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("condition not met within {WAIT:?}"));
    }

    // =========================================================================
    // INBOUND NOISE
    // =========================================================================

    #[tokio::test]
    async fn test_noise_does_not_disturb_a_pending_call() {
        let mut peer = RawPeer::new("caller");
        let reply = peer
            .channel
            .client()
            .dispatch(CallKind::Query, "ping", Value::Null, CallOptions::default())
            .await
            .unwrap();
        let op = peer.next_call().await;
        let codec = peer.channel.codec();

        let stray = codec
            .encode_result(CallId(999), &Outcome::Data(Value::Null))
            .unwrap();
        for noise in [
            "yeyeyeeeee".to_string(),
            "::other::call::{}".to_string(),
            format!("::tipc::result::{}:{{broken", op.id),
            "::tipc::result::abc:{}".to_string(),
            stray,
        ] {
            peer.tx.send(noise.into()).await.unwrap();
        }

        let answer = codec
            .encode_result(op.id, &Outcome::Data(Value::Int(1)))
            .unwrap();
        peer.tx.send(answer.into()).await.unwrap();

        let outcome = timeout(WAIT, reply.wait()).await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::Data(Value::Int(1)));

        let stats = peer.channel.stats();
        assert_eq!(stats.frames_received, 6);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.correlation.orphaned, 1);
        assert_eq!(stats.correlation.settled, 1);
        assert!(!peer.channel.is_closed());
    }

    #[tokio::test]
    async fn test_unanswered_call_stays_pending() {
        let mut peer = RawPeer::new("caller");
        let reply = peer
            .channel
            .client()
            .dispatch(CallKind::Query, "ping", Value::Null, CallOptions::default())
            .await
            .unwrap();
        peer.next_call().await;

        let mut waiting = reply.into_future();
        assert!(timeout(Duration::from_millis(50), &mut waiting)
            .await
            .is_err());
        assert_eq!(peer.channel.pending_count(), 1);

        drop(waiting);
        assert_eq!(peer.channel.pending_count(), 0);
        assert_eq!(peer.channel.stats().correlation.cancelled, 1);
    }

    // =========================================================================
    // DEADLINES AND CANCELLATION
    // =========================================================================

    #[tokio::test]
    async fn test_timeout_then_late_result_is_an_orphan() {
        let (caller, server) = peers("caller", "server");
        slow_server(&server);

        let err = caller
            .client()
            .call(
                CallKind::Query,
                "slow",
                Value::Null,
                CallOptions::default().with_timeout(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CallError::TimedOut(20));
        assert_eq!(caller.pending_count(), 0);

        eventually(|| caller.stats().correlation.orphaned == 1).await;
        let stats = caller.stats();
        assert_eq!(stats.correlation.timed_out, 1);
        assert_eq!(stats.correlation.settled, 0);
        assert_eq!(server.stats().calls_handled, 1);
    }

    #[tokio::test]
    async fn test_sweeper_expires_unawaited_calls() {
        let config = ChannelConfig {
            sweep_interval_ms: Some(5),
            ..ChannelConfig::named("caller")
        };
        let mut peer = RawPeer::with_config(config);
        let reply = peer
            .channel
            .client()
            .dispatch(
                CallKind::Query,
                "ping",
                Value::Null,
                CallOptions::default().with_timeout(Duration::from_millis(10)),
            )
            .await
            .unwrap();
        peer.next_call().await;

        eventually(|| peer.channel.pending_count() == 0).await;
        assert_eq!(peer.channel.stats().correlation.timed_out, 1);
        assert_eq!(reply.wait().await, Err(CallError::TimedOut(10)));
    }

    #[tokio::test]
    async fn test_cancel_token_abandons_call() {
        let (caller, server) = peers("caller", "server");
        slow_server(&server);

        let token = CancellationToken::new();
        let reply = caller
            .client()
            .dispatch(
                CallKind::Query,
                "slow",
                Value::Null,
                CallOptions::default().with_cancel(token.clone()),
            )
            .await
            .unwrap();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        assert_eq!(reply.wait().await, Err(CallError::Cancelled));
        canceller.await.unwrap();

        // The peer still answers; the answer is dropped here.
        eventually(|| caller.stats().correlation.orphaned == 1).await;
        assert_eq!(caller.stats().correlation.cancelled, 1);
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    #[tokio::test]
    async fn test_close_fails_calls_in_flight() {
        let (caller, server) = peers("caller", "server");
        slow_server(&server);
        let client = caller.client();

        let reply = client
            .dispatch(CallKind::Query, "slow", Value::Null, CallOptions::default())
            .await
            .unwrap();
        caller.close();

        assert_eq!(reply.wait().await, Err(CallError::ChannelClosed));
        assert_eq!(
            client.query("slow", ()).await,
            Err(CallError::ChannelClosed)
        );
        assert_eq!(caller.stats().correlation.failed, 1);
    }

    #[tokio::test]
    async fn test_transport_loss_fails_calls_in_flight() {
        let RawPeer { channel, tx, mut rx } = RawPeer::new("caller");
        let reply = channel
            .client()
            .dispatch(CallKind::Query, "ping", Value::Null, CallOptions::default())
            .await
            .unwrap();
        drop(tx);

        assert_eq!(
            timeout(WAIT, reply.wait()).await.unwrap(),
            Err(CallError::ChannelClosed)
        );
        timeout(WAIT, channel.closed()).await.unwrap();
        assert!(channel.is_closed());

        // The call frame itself did go out.
        assert!(timeout(WAIT, rx.receive()).await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_dropping_a_peer_closes_the_other() {
        let (caller, server) = peers("caller", "server");
        drop(caller);

        timeout(WAIT, server.closed()).await.unwrap();
        assert_eq!(
            server.client().query("anything", ()).await,
            Err(CallError::ChannelClosed)
        );
    }
}
