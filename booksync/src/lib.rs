//! # booksync
//!
//! Order book synchronization engine for exchange market data.
//!
//! booksync keeps a local replica of each exchange order book consistent with
//! the exchange by reconciling a REST snapshot with the incremental update
//! stream, detecting gaps and corruption, and transparently resynchronizing
//! without ever publishing an inconsistent book.
//!
//! ## Features
//!
//! - **Snapshot/delta reconciliation** - updates are buffered until a snapshot
//!   is installed, then replayed from the bridging update onwards
//! - **Two sequencing models** - strict update-id continuity (Binance-style)
//!   and top-N CRC-32 checksums (OKX-style)
//! - **Automatic resync** - gaps, checksum mismatches, crossed books and
//!   buffer overflows discard the replica and re-baseline from a new snapshot
//! - **Failure isolation** - one tokio task per (exchange, market, symbol),
//!   with degradation after repeated errors
//!
//! ## Quick Start
//!
//! ```ignore
//! use booksync::prelude::*;
//!
//! let (publisher, mut events) = ChannelPublisher::new(1024);
//! let mut supervisor = SupervisorBuilder::new(Arc::new(rest_client), Arc::new(publisher))
//!     .build();
//!
//! supervisor.subscribe(SymbolKey::new("binance", "spot", "BTCUSDT"), SequencingPolicy::UpdateId)?;
//! supervisor.submit(update).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Data model, events, health records, errors
//! - [`book`] - Price level sets and the order book replica
//! - [`sync`] - Buffering, continuity checks, validation and the sync engine
//! - [`runtime`] - Collaborator traits, per-symbol tasks and the supervisor

pub mod prelude;

/// Data model, events, health records and errors.
pub mod core {
    pub use booksync_core::*;
}

/// Price level sets and the order book replica.
pub mod book {
    pub use booksync_book::*;
}

/// Per-symbol synchronization engine.
pub mod sync {
    pub use booksync_sync::*;
}

/// Async runtime and supervision.
pub mod runtime {
    pub use booksync_runtime::*;
}
