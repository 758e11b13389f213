//! # booksync bench
//!
//! Benchmarking utilities for the booksync apply path.

pub mod feed;
pub mod latency;

pub use feed::SyntheticFeed;
pub use latency::{LatencySummary, UpdateLatency, UpdatePath};
