//! Delta apply benchmarks.

use booksync_bench::SyntheticFeed;
use booksync_book::{OrderBookReplica, PriceLevelSet};
use booksync_core::{PriceLevel, SequencingPolicy, Side, SymbolKey};
use booksync_sync::DeltaApplier;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rust_decimal::Decimal;
use std::hint::black_box;

fn key() -> SymbolKey {
    SymbolKey::new("bench", "spot", "SYN")
}

fn benchmark_level_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("upsert_remove", |b| {
        let mut set = PriceLevelSet::new(Side::Bid);
        for i in 1..=100u64 {
            set.apply(PriceLevel::new(Decimal::from(i), Decimal::ONE));
        }
        let price = Decimal::from(50);

        b.iter(|| {
            set.apply(black_box(PriceLevel::new(price, Decimal::ZERO)));
            set.apply(black_box(PriceLevel::new(price, Decimal::TWO)));
        })
    });

    group.bench_function("best", |b| {
        let mut set = PriceLevelSet::new(Side::Ask);
        for i in 1..=100u64 {
            set.apply(PriceLevel::new(Decimal::from(i), Decimal::ONE));
        }

        b.iter(|| black_box(set.best()))
    });

    group.finish();
}

fn benchmark_delta_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("delta_apply");
    group.throughput(Throughput::Elements(1));

    for changes in [1u64, 10] {
        group.bench_function(format!("update_id_{}_changes", changes), |b| {
            let mut feed = SyntheticFeed::new(key(), 100);
            let mut replica = OrderBookReplica::from_snapshot(key(), &feed.snapshot()).unwrap();
            let applier = DeltaApplier::new(SequencingPolicy::UpdateId);

            b.iter(|| {
                let update = feed.next_update(changes);
                applier.apply(black_box(&mut replica), black_box(&update)).unwrap();
            })
        });
    }

    group.finish();
}

fn benchmark_checksum(c: &mut Criterion) {
    let feed = SyntheticFeed::new(key(), 100);
    let replica = OrderBookReplica::from_snapshot(key(), &feed.snapshot()).unwrap();

    c.bench_function("checksum_top_25", |b| {
        b.iter(|| black_box(replica.compute_checksum(black_box(25))))
    });
}

criterion_group!(
    benches,
    benchmark_level_set,
    benchmark_delta_apply,
    benchmark_checksum
);
criterion_main!(benches);
