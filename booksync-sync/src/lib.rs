//! # booksync sync
//!
//! Per-symbol synchronization of a local order book replica with an
//! exchange's snapshot and incremental update stream.
//!
//! This crate provides:
//! - [`UpdateBuffer`] - bounded FIFO of updates waiting for a snapshot
//! - [`SyncStateMachine`] - `UNSYNCED -> SYNCING -> SYNCED -> ERROR` with degradation
//! - [`DeltaApplier`] - continuity checks and level mutation
//! - [`ConsistencyValidator`] - checksum and crossed-book checks
//! - [`SnapshotBackoff`] - numbering and retry delays of snapshot fetches
//! - [`SyncEngine`] - the orchestrator, returning [`SyncOutcome`]s for a runtime to execute

pub mod applier;
pub mod backoff;
pub mod buffer;
pub mod config;
pub mod engine;
pub mod state;
pub mod validator;

pub use applier::DeltaApplier;
pub use backoff::{BackoffConfig, RetryDecision, SnapshotBackoff};
pub use buffer::{BufferedUpdate, Drained, UpdateBuffer};
pub use config::SyncConfig;
pub use engine::{FetchRequest, SyncEngine, SyncOutcome, SyncStats};
pub use state::{ErrorDisposition, ErrorWindow, SyncStateMachine, TransitionError};
pub use validator::ConsistencyValidator;
