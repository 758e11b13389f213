//! Per-symbol synchronization state and health records.

use crate::types::SymbolKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Synchronization state of one order book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// No snapshot requested yet.
    #[default]
    Unsynced,
    /// Waiting for a snapshot; updates are buffered.
    Syncing,
    /// Replica is consistent; updates are applied directly.
    Synced,
    /// Consistency lost; updates are discarded until resync.
    Error,
}

impl SyncState {
    /// Returns true if the replica may be published downstream.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }

    /// Returns true if incoming updates are buffered rather than applied.
    #[must_use]
    pub const fn buffers_updates(&self) -> bool {
        matches!(self, Self::Unsynced | Self::Syncing)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unsynced => "UNSYNCED",
            Self::Syncing => "SYNCING",
            Self::Synced => "SYNCED",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Health signal surfaced whenever a symbol's state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolHealth {
    /// Exchange name.
    pub exchange: String,
    /// Market segment.
    pub market: String,
    /// Exchange symbol.
    pub symbol: String,
    /// Current sync state.
    pub state: SyncState,
    /// Errors since the last successfully applied update.
    pub consecutive_errors: u32,
    /// Display form of the most recent error.
    pub last_error: Option<String>,
    /// Set once the error threshold was exceeded; cleared by a restart.
    pub degraded: bool,
    /// Time the record was produced.
    pub updated_at: DateTime<Utc>,
}

impl SymbolHealth {
    /// Creates a health record for the given book.
    #[must_use]
    pub fn new(key: &SymbolKey, state: SyncState) -> Self {
        Self {
            exchange: key.exchange.clone(),
            market: key.market.clone(),
            symbol: key.symbol.clone(),
            state,
            consecutive_errors: 0,
            last_error: None,
            degraded: false,
            updated_at: Utc::now(),
        }
    }

    /// Returns the key of the book this record describes.
    #[must_use]
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(&self.exchange, &self.market, &self.symbol)
    }
}
