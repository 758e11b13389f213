//! Sync engine benchmarks.

use booksync_bench::{SyntheticFeed, UpdateLatency, UpdatePath};
use booksync_book::OrderBookReplica;
use booksync_core::{SequencingPolicy, SymbolKey};
use booksync_sync::{SyncConfig, SyncEngine};
use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn key() -> SymbolKey {
    SymbolKey::new("bench", "spot", "SYN")
}

fn synced_engine(feed: &SyntheticFeed) -> SyncEngine {
    let mut engine = SyncEngine::new(key(), SequencingPolicy::UpdateId, SyncConfig::default());
    let _ = engine.start();
    let replica = OrderBookReplica::from_snapshot(key(), &feed.snapshot()).unwrap();
    let _ = engine.on_snapshot(engine.fetch_generation(), replica);
    engine
}

fn benchmark_on_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(1));

    group.bench_function("on_update_synced", |b| {
        let mut feed = SyntheticFeed::new(key(), 100);
        let mut engine = synced_engine(&feed);

        b.iter(|| black_box(engine.on_update(feed.next_update(4))))
    });

    group.finish();
}

fn benchmark_snapshot_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(500));

    group.bench_function("replay_500_buffered", |b| {
        b.iter_batched(
            || {
                let mut feed = SyntheticFeed::new(key(), 100);
                let mut engine =
                    SyncEngine::new(key(), SequencingPolicy::UpdateId, SyncConfig::default());
                let _ = engine.start();
                let snapshot = feed.snapshot();
                for _ in 0..500 {
                    let _ = engine.on_update(feed.next_update(4));
                }
                let replica = OrderBookReplica::from_snapshot(key(), &snapshot).unwrap();
                (engine, replica)
            },
            |(mut engine, replica)| {
                let generation = engine.fetch_generation();
                black_box(engine.on_snapshot(generation, replica))
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn benchmark_update_latency(c: &mut Criterion) {
    c.bench_function("on_update_latency_10k", |b| {
        b.iter_batched(
            || {
                let feed = SyntheticFeed::new(key(), 100);
                let engine = synced_engine(&feed);
                (feed, engine)
            },
            |(mut feed, mut engine)| {
                let mut latency = UpdateLatency::with_capacity(10_000);
                for _ in 0..10_000 {
                    black_box(latency.feed(&mut engine, feed.next_update(4)));
                }
                black_box(latency.summary(UpdatePath::Applied))
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    benchmark_on_update,
    benchmark_snapshot_replay,
    benchmark_update_latency
);
criterion_main!(benches);
