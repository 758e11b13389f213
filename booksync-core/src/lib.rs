//! # booksync core
//!
//! Shared data model for order book synchronization.
//!
//! This crate provides:
//! - Price levels, symbol keys and incremental update records
//! - Snapshot results as returned by the REST collaborator
//! - Output events and per-symbol health records
//! - Exchange sequencing policies (update-id continuity vs checksum)
//! - The sync error taxonomy

pub mod error;
pub mod event;
pub mod policy;
pub mod status;
pub mod types;

pub use error::{Result, Severity, SyncError};
pub use event::{EventKind, OrderBookEvent};
pub use policy::SequencingPolicy;
pub use status::{SymbolHealth, SyncState};
pub use types::{IncrementalUpdate, PriceLevel, Side, SnapshotData, SymbolKey};
