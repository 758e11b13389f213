//! Replays a synthetic depth stream through the supervisor, including a
//! sequence gap that forces a resync.
//!
//! Run with: `RUST_LOG=info cargo run --example replay`

use booksync::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Last update id the synthetic exchange has published.
#[derive(Default)]
struct StreamHead(AtomicU64);

impl StreamHead {
    fn set(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Serves a snapshot at whatever id the synthetic stream has reached.
struct SyntheticExchange {
    listed: SymbolKey,
    head: Arc<StreamHead>,
}

#[async_trait]
impl SnapshotSource for SyntheticExchange {
    async fn fetch_snapshot(&self, key: &SymbolKey) -> Result<SnapshotData, SourceError> {
        // Simulated REST latency.
        tokio::time::sleep(Duration::from_millis(20)).await;

        if *key != self.listed {
            return Err(SourceError::UnknownSymbol(key.clone()));
        }
        let id = self.head.get();
        println!("[Exchange] Serving snapshot {} for {}", id, key);
        Ok(SnapshotData::new(id, ladder(Side::Bid, id), ladder(Side::Ask, id)))
    }
}

fn ladder(side: Side, id: u64) -> Vec<PriceLevel> {
    let mid = dec!(50000);
    (1..=5)
        .map(|i| {
            let offset = Decimal::from(i * 10);
            let price = match side {
                Side::Bid => mid - offset,
                Side::Ask => mid + offset,
            };
            PriceLevel::new(price, Decimal::from(id % 7 + i))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let key = SymbolKey::new("binance", "spot", "BTCUSDT");
    let head = Arc::new(StreamHead::default());
    head.set(100);

    let (publisher, mut events) = ChannelPublisher::new(256);
    let registry = HealthRegistry::new();

    let mut supervisor = SupervisorBuilder::new(
        Arc::new(SyntheticExchange {
            listed: key.clone(),
            head: Arc::clone(&head),
        }),
        Arc::new(publisher),
    )
    .health_sink(Arc::new(registry.clone()))
    .publish_timeout(Duration::from_secs(1))
    .build();

    supervisor.subscribe(key.clone(), SequencingPolicy::UpdateId)?;

    let consumer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => println!("[Consumer] {}", json),
                Err(e) => eprintln!("[Consumer] Failed to encode event: {}", e),
            }
        }
    });

    for id in 101..=140u64 {
        // Drop update 120 on the floor to simulate a lost message.
        if id == 120 {
            head.set(id);
            continue;
        }

        let price = dec!(50000) - Decimal::from(id % 5 + 1) * dec!(10);
        let update = IncrementalUpdate::new(&key, id, id)
            .with_bids(vec![PriceLevel::new(price, Decimal::from(id % 3))]);

        head.set(id);
        supervisor.submit(update).await?;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    if let Some(health) = registry.get(&key) {
        println!(
            "[Health] {} state={} consecutive_errors={} last_error={:?}",
            key, health.state, health.consecutive_errors, health.last_error
        );
    }

    let stats = supervisor.shutdown().await;
    if let Some(stats) = stats.get(&key) {
        println!("[Stats] {:?}", stats);
    }

    consumer.abort();
    Ok(())
}
