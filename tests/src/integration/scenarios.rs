//! # Request/Response Scenarios
//!
//! One call frame out, one result frame back, matched by ID. Covers a single
//! query, answers arriving out of order, error outcomes, and many calls in
//! flight at once.

#[cfg(test)]
mod tests {
    use crate::{peers, RawPeer, WAIT};
    use futures::future::join_all;
    use std::collections::HashSet;
    use std::time::Duration;
    use tipc_core::{
        CallError, CallId, CallKind, CallOptions, FrameSender, HandlerOptions, Outcome,
        PendingReply, ProcedureRouter, RouterError, Value,
    };
    use tokio::time::timeout;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn counter(n: i64) -> Value {
        Value::object([("counter", Value::Int(n))])
    }

    fn echo_router() -> ProcedureRouter {
        ProcedureRouter::new()
            .query("echo", |_, input: Value| async move {
                // Later calls answer sooner so results come back reordered.
                let n = input.as_i64().unwrap_or(0);
                let delay = u64::try_from(50 - n.clamp(0, 50)).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, RouterError>(input)
            })
            .query("ping", |_, _| async { Ok::<_, RouterError>(counter(1)) })
            .mutation("fail", |_, _| async { Err::<Value, _>(RouterError::failed("X")) })
    }

    // =========================================================================
    // SINGLE CALL
    // =========================================================================

    #[tokio::test]
    async fn test_query_settles_with_matching_result() {
        let mut peer = RawPeer::new("caller");
        let client = peer.channel.client();

        let reply = client
            .dispatch(CallKind::Query, "ping", Value::Null, CallOptions::default())
            .await
            .unwrap();

        let op = peer.next_call().await;
        assert_eq!(op.id, CallId(1));
        assert_eq!(op.kind, CallKind::Query);
        assert_eq!(op.path, "ping");
        assert_eq!(op.input, Value::Null);
        assert_eq!(op.context, None);

        let frame = peer
            .channel
            .codec()
            .encode_result(op.id, &Outcome::Data(counter(1)))
            .unwrap();
        peer.tx.send(frame.into()).await.unwrap();

        let outcome = timeout(WAIT, reply.wait()).await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::Data(counter(1)));
        assert_eq!(peer.channel.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_results_out_of_order_settle_their_own_calls() {
        let mut peer = RawPeer::new("caller");
        let client = peer.channel.client();

        let first = client
            .dispatch(CallKind::Query, "ping", Value::Null, CallOptions::default())
            .await
            .unwrap();
        let second = client
            .dispatch(CallKind::Query, "ping", Value::Null, CallOptions::default())
            .await
            .unwrap();
        assert_eq!((first.id(), second.id()), (CallId(1), CallId(2)));
        assert_eq!(peer.next_call().await.id, CallId(1));
        assert_eq!(peer.next_call().await.id, CallId(2));

        let codec = peer.channel.codec();
        let answer = |id: CallId, n: i64| {
            codec
                .encode_result(id, &Outcome::Data(counter(n)))
                .unwrap()
        };

        peer.tx.send(answer(CallId(2), 2).into()).await.unwrap();
        let outcome = timeout(WAIT, second.wait()).await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::Data(counter(2)));

        // Call 1 is still waiting.
        assert_eq!(peer.channel.pending_count(), 1);

        peer.tx.send(answer(CallId(1), 1).into()).await.unwrap();
        let outcome = timeout(WAIT, first.wait()).await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::Data(counter(1)));
        assert_eq!(peer.channel.pending_count(), 0);
    }

    // =========================================================================
    // SERVED PEERS
    // =========================================================================

    #[tokio::test]
    async fn test_error_outcome_rejects_only_that_call() {
        let (caller, server) = peers("caller", "server");
        let _handler = server.serve(echo_router(), HandlerOptions::default()).unwrap();
        let client = caller.client();

        for _ in 0..6 {
            assert_eq!(client.query("ping", ()).await.unwrap(), counter(1));
        }

        let reply = client
            .dispatch(CallKind::Mutation, "fail", Value::Null, CallOptions::default())
            .await
            .unwrap();
        assert_eq!(reply.id(), CallId(7));
        let outcome = timeout(WAIT, reply.wait()).await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::Error(Value::from("X")));

        let err = client.mutate("fail", ()).await.unwrap_err();
        assert!(matches!(err, CallError::Remote(ref v) if v == &Value::from("X")));

        // The link keeps working afterwards.
        assert_eq!(client.query("ping", ()).await.unwrap(), counter(1));
        assert_eq!(server.stats().router_errors, 2);
    }

    #[tokio::test]
    async fn test_concurrent_calls_get_their_own_answers() {
        let (caller, server) = peers("caller", "server");
        let _handler = server.serve(echo_router(), HandlerOptions::default()).unwrap();
        let client = caller.client();

        let mut replies = Vec::new();
        for n in 0..50_i64 {
            let reply = client
                .dispatch(CallKind::Query, "echo", Value::Int(n), CallOptions::default())
                .await
                .unwrap();
            replies.push(reply);
        }

        let ids: HashSet<CallId> = replies.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), 50);
        assert_eq!(caller.pending_count(), 50);

        let outcomes = timeout(WAIT, join_all(replies.into_iter().map(PendingReply::wait)))
            .await
            .unwrap();
        for (n, outcome) in outcomes.into_iter().enumerate() {
            let n = i64::try_from(n).unwrap();
            assert_eq!(outcome.unwrap(), Outcome::Data(Value::Int(n)));
        }

        let stats = caller.stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.correlation.settled, 50);
        assert_eq!(stats.correlation.orphaned, 0);
        assert_eq!(server.stats().calls_handled, 50);
    }

    #[tokio::test]
    async fn test_context_reaches_the_procedure() {
        let (caller, server) = peers("caller", "server");
        let router = ProcedureRouter::new().query("whoami", |ctx, _| async move {
            Ok::<_, RouterError>(ctx.context.unwrap_or(Value::Null))
        });
        let _handler = server.serve(router, HandlerOptions::default()).unwrap();

        let outcome = caller
            .client()
            .call(
                CallKind::Query,
                "whoami",
                Value::Null,
                CallOptions::default().with_context(Value::object([("user", Value::from("ada"))])),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Data(Value::object([("user", Value::from("ada"))]))
        );
    }
}
