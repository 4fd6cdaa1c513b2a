//! # TIPC Protocol Benchmarks
//!
//! | Area | What is measured |
//! |------|------------------|
//! | Transformers | Value to wire JSON and back, tagged vs plain |
//! | Codec | Frame encode, classify and decode |
//! | Round trip | One call over an in-memory link, sequential and in batches |

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::future::join_all;
use std::time::Duration;
use tipc_core::{
    CallId, CallKind, CallOptions, Channel, ChannelConfig, FrameRef, HandlerOptions, Operation,
    Outcome, PendingReply, PlainJson, ProcedureRouter, RawMessage, RouterError, TaggedJson,
    Transformer, TransformerKind, Value, WireCodec, DEFAULT_PREFIX,
};

fn payload(items: usize) -> Value {
    let date = Utc
        .timestamp_opt(1_700_000_000, 123_456_789)
        .single()
        .unwrap_or_default();
    let rows: Vec<Value> = (0..items)
        .map(|i| {
            Value::object([
                ("id", Value::Int(i as i64)),
                ("name", Value::from(format!("row-{i}"))),
                ("seen", Value::Timestamp(date)),
                ("score", Value::Float(i as f64 * 0.5)),
            ])
        })
        .collect();
    Value::object([("rows", Value::Array(rows))])
}

// ============================================================================
// Transformers
// ============================================================================

fn bench_transformers(c: &mut Criterion) {
    let mut group = c.benchmark_group("transformers");

    for size in [1, 10, 100] {
        let value = payload(size);
        group.throughput(Throughput::Elements(size as u64));

        for (name, transformer) in [
            ("tagged", &TaggedJson as &dyn Transformer),
            ("plain", &PlainJson as &dyn Transformer),
        ] {
            let wire = transformer.serialize(&value).unwrap_or_default();
            group.bench_with_input(
                BenchmarkId::new(format!("{name}_serialize"), size),
                &value,
                |b, v| b.iter(|| black_box(transformer.serialize(v))),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("{name}_deserialize"), size),
                &wire,
                |b, w| b.iter(|| black_box(transformer.deserialize(w.clone()))),
            );
        }
    }

    group.finish();
}

// ============================================================================
// Codec
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let codec = WireCodec::new(DEFAULT_PREFIX, TransformerKind::Tagged.build());

    let op = Operation::new(CallId(42), CallKind::Query, "woah.nested.yee", payload(10));
    group.bench_function("encode_call", |b| b.iter(|| black_box(codec.encode_call(&op))));

    let outcome = Outcome::Data(payload(10));
    let result = RawMessage::from(codec.encode_result(CallId(42), &outcome).unwrap_or_default());
    group.bench_function("classify_and_decode_result", |b| {
        b.iter(|| match codec.classify(&result) {
            Ok(FrameRef::Result { id, body }) => black_box(codec.decode_result(id, body).is_ok()),
            _ => false,
        })
    });

    let noise = RawMessage::from("yeyeyeeeee");
    group.bench_function("classify_foreign_message", |b| {
        b.iter(|| black_box(codec.classify(&noise).is_err()))
    });

    group.finish();
}

// ============================================================================
// Round trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => panic!("failed to start runtime: {e}"),
    };
    let _enter = runtime.enter();

    let Ok((caller, server)) = Channel::memory_pair(
        ChannelConfig::named("caller"),
        ChannelConfig::named("server"),
    ) else {
        panic!("failed to create channels");
    };
    let router = ProcedureRouter::new().query("echo", |_, input: Value| async move {
        Ok::<_, RouterError>(input)
    });
    let Ok(_handler) = server.serve(router, HandlerOptions::default()) else {
        panic!("failed to start request handler");
    };
    let client = caller.client();

    let mut group = c.benchmark_group("round_trip");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("sequential_call", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(client.query("echo", Value::Int(1)).await.is_ok()) })
    });

    for batch in [10, 100] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("concurrent_calls", batch), &batch, |b, &n| {
            b.to_async(&runtime).iter(|| async {
                let mut replies = Vec::with_capacity(n);
                for i in 0..n {
                    if let Ok(reply) = client
                        .dispatch(
                            CallKind::Query,
                            "echo",
                            Value::Int(i as i64),
                            CallOptions::default(),
                        )
                        .await
                    {
                        replies.push(reply);
                    }
                }
                black_box(join_all(replies.into_iter().map(PendingReply::wait)).await.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transformers, bench_codec, bench_round_trip);
criterion_main!(benches);
