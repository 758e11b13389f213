//! # booksync book
//!
//! Local order book replica.
//!
//! This crate provides:
//! - [`PriceLevelSet`] - one side of the book, ordered best price first
//! - [`OrderBookReplica`] - bids, asks and sequencing metadata for one symbol
//! - [`checksum`] - top-N checksums as published by checksum-sequenced exchanges

pub mod checksum;
pub mod level_set;
pub mod replica;

pub use level_set::PriceLevelSet;
pub use replica::{OrderBookReplica, check_level};
