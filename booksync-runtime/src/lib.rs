//! # booksync runtime
//!
//! Async execution of the per-symbol sync engines on tokio.
//!
//! This crate provides:
//! - [`SnapshotSource`] and [`OrderBookPublisher`] - the REST and output collaborators
//! - [`SnapshotCoordinator`] - turns fetched snapshots into replica baselines
//! - [`HealthSink`], [`HealthRegistry`] and [`TracingHealthSink`] - health reporting
//! - [`Supervisor`] - one task and one inbound channel per subscribed symbol

pub mod config;
pub mod error;
pub mod health;
pub mod publisher;
pub mod source;
pub mod supervisor;
mod worker;

pub use config::RuntimeConfig;
pub use error::{PublishError, RuntimeError, SourceError};
pub use health::{HealthRegistry, HealthSink, TracingHealthSink};
pub use publisher::{ChannelPublisher, OrderBookPublisher};
pub use source::{SnapshotCoordinator, SnapshotSource};
pub use supervisor::{Supervisor, SupervisorBuilder};

// Re-export for implementors of the collaborator traits.
pub use async_trait::async_trait;
