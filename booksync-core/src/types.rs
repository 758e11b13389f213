//! Price levels, symbol keys and the records exchanged with collaborators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order book side (bid or ask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Bid (buy) side.
    Bid,
    /// Ask (sell) side.
    Ask,
}

impl Side {
    /// Returns the other side of the book.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => f.write_str("bid"),
            Self::Ask => f.write_str("ask"),
        }
    }
}

/// Aggregated quantity resting at one price.
///
/// A quantity of zero inside an update means "remove this price".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price.
    pub price: Decimal,
    /// Total quantity at this price.
    pub quantity: Decimal,
}

impl PriceLevel {
    /// Creates a new price level.
    #[must_use]
    pub const fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Returns true if this level removes its price from the book.
    #[inline]
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Returns true if the quantity is negative, which no exchange sends.
    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.quantity.is_sign_negative() && !self.quantity.is_zero()
    }
}

/// Identifies one order book: `(exchange, market, symbol)`.
///
/// This triple is the unit of concurrency and failure isolation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolKey {
    /// Exchange name, e.g. `binance`.
    pub exchange: String,
    /// Market segment, e.g. `spot` or `usdm`.
    pub market: String,
    /// Exchange symbol, e.g. `BTCUSDT`.
    pub symbol: String,
}

impl SymbolKey {
    /// Creates a new symbol key.
    #[must_use]
    pub fn new(
        exchange: impl Into<String>,
        market: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            market: market.into(),
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.exchange, self.market, self.symbol)
    }
}

/// Incremental order book update, already decoded from the exchange feed.
///
/// Immutable once constructed; the `with_*` methods consume the value and are
/// meant for the decoder building it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalUpdate {
    /// Exchange name.
    pub exchange: String,
    /// Market segment.
    pub market: String,
    /// Exchange symbol.
    pub symbol: String,
    /// First update id covered by this message.
    pub first_update_id: u64,
    /// Last update id covered by this message.
    pub last_update_id: u64,
    /// Last update id of the previous message, when the exchange reports it.
    pub prev_update_id: Option<u64>,
    /// Changed bid levels.
    pub bid_changes: Vec<PriceLevel>,
    /// Changed ask levels.
    pub ask_changes: Vec<PriceLevel>,
    /// Exchange checksum over the top levels after this update.
    pub checksum: Option<i64>,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

impl IncrementalUpdate {
    /// Creates an update with no level changes.
    #[must_use]
    pub fn new(key: &SymbolKey, first_update_id: u64, last_update_id: u64) -> Self {
        Self {
            exchange: key.exchange.clone(),
            market: key.market.clone(),
            symbol: key.symbol.clone(),
            first_update_id,
            last_update_id,
            prev_update_id: None,
            bid_changes: Vec::new(),
            ask_changes: Vec::new(),
            checksum: None,
            received_at: Utc::now(),
        }
    }

    /// Sets the previous update id reported by the exchange.
    #[must_use]
    pub fn with_prev_update_id(mut self, prev_update_id: u64) -> Self {
        self.prev_update_id = Some(prev_update_id);
        self
    }

    /// Sets the changed bid levels.
    #[must_use]
    pub fn with_bids(mut self, bids: Vec<PriceLevel>) -> Self {
        self.bid_changes = bids;
        self
    }

    /// Sets the changed ask levels.
    #[must_use]
    pub fn with_asks(mut self, asks: Vec<PriceLevel>) -> Self {
        self.ask_changes = asks;
        self
    }

    /// Sets the exchange checksum.
    #[must_use]
    pub fn with_checksum(mut self, checksum: i64) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Returns the key of the book this update belongs to.
    #[must_use]
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(&self.exchange, &self.market, &self.symbol)
    }

    /// Returns true if this update targets the given book.
    #[must_use]
    pub fn belongs_to(&self, key: &SymbolKey) -> bool {
        self.exchange == key.exchange && self.market == key.market && self.symbol == key.symbol
    }

    /// Iterates over every level change with its side.
    pub fn changes(&self) -> impl Iterator<Item = (Side, &PriceLevel)> {
        self.bid_changes
            .iter()
            .map(|l| (Side::Bid, l))
            .chain(self.ask_changes.iter().map(|l| (Side::Ask, l)))
    }
}

/// Full book snapshot returned by the REST collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Update id the snapshot is consistent with.
    pub last_update_id: u64,
    /// Bid levels, any order.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, any order.
    pub asks: Vec<PriceLevel>,
    /// Exchange checksum of the snapshot, when provided.
    pub checksum: Option<i64>,
}

impl SnapshotData {
    /// Creates a snapshot without a checksum.
    #[must_use]
    pub fn new(last_update_id: u64, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            last_update_id,
            bids,
            asks,
            checksum: None,
        }
    }
}
