//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! ```ignore
//! use booksync::prelude::*;
//! ```

// Data model
pub use booksync_core::{
    EventKind, IncrementalUpdate, OrderBookEvent, PriceLevel, SequencingPolicy, Side,
    SnapshotData, SymbolHealth, SymbolKey, SyncError, SyncState,
};

// Book types
pub use booksync_book::{OrderBookReplica, PriceLevelSet};

// Engine types
pub use booksync_sync::{
    BackoffConfig, ConsistencyValidator, DeltaApplier, SyncConfig, SyncEngine, SyncOutcome,
    SyncStats, UpdateBuffer,
};

// Runtime types
pub use booksync_runtime::{
    ChannelPublisher, HealthRegistry, HealthSink, OrderBookPublisher, PublishError, RuntimeConfig,
    RuntimeError, SnapshotSource, SourceError, Supervisor, SupervisorBuilder, TracingHealthSink,
    async_trait,
};
