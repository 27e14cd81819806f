//! Performance benchmarks for the event relay.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use event_relay::{channel_pair, Link, Relay, RelayConfig, SequenceGuard};
use serde_json::{json, Value};

fn connected() -> (Relay, Link, Relay, Link) {
    let (a_link, b_link) = channel_pair();
    let a = Relay::with_transport(RelayConfig::default(), a_link.transport.clone());
    let b = Relay::with_transport(RelayConfig::default(), b_link.transport.clone());
    (a, a_link, b, b_link)
}

fn settle(a: &Relay, a_link: &Link, b: &Relay, b_link: &Link) {
    while a.pump(&a_link.inbox) + b.pump(&b_link.inbox) > 0 {}
}

/// Benchmark forwarding one emission to a varying number of local handlers
fn bench_event_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_fan_out");

    for handlers in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("handlers", handlers),
            &handlers,
            |bencher, &handlers| {
                let (a, a_link, b, b_link) = connected();
                let handles: Vec<_> = (0..handlers)
                    .map(|_| {
                        b.subscribe("event", |args: &[Value]| {
                            black_box(args);
                        })
                    })
                    .collect();
                settle(&a, &a_link, &b, &b_link);
                let root = a.root().unwrap();

                bencher.iter(|| {
                    root.emit("event", &[json!(42)]);
                    black_box(b.pump(&b_link.inbox));
                });
                drop(handles);
            },
        );
    }

    group.finish();
}

/// Benchmark a full subscribe/unsubscribe handshake
fn bench_subscribe_cycle(c: &mut Criterion) {
    c.bench_function("subscribe_cycle", |bencher| {
        let (a, a_link, b, b_link) = connected();

        bencher.iter(|| {
            let handle = b.subscribe("event", |_: &[Value]| {});
            settle(&a, &a_link, &b, &b_link);
            b.unsubscribe("event", handle.handler);
            settle(&a, &a_link, &b, &b_link);
        });
    });
}

/// Benchmark sequence acceptance, including across wraparound
fn bench_sequence_guard(c: &mut Criterion) {
    c.bench_function("sequence_accept", |bencher| {
        let mut guard = SequenceGuard::with_local_seed(u32::MAX - 1000);
        let mut next = u32::MAX - 1000;

        bencher.iter(|| {
            next = next.wrapping_add(1);
            black_box(guard.accept_remote(next));
        });
    });
}

criterion_group!(
    benches,
    bench_event_fan_out,
    bench_subscribe_cycle,
    bench_sequence_guard
);
criterion_main!(benches);
