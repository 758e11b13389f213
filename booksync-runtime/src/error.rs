//! Error types for the runtime and its collaborators.

use booksync_core::SymbolKey;
use thiserror::Error;

/// Error type for supervisor operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The symbol already has a running task.
    #[error("symbol already subscribed: {0}")]
    AlreadySubscribed(SymbolKey),

    /// The symbol has no running task.
    #[error("symbol not subscribed: {0}")]
    NotSubscribed(SymbolKey),

    /// The symbol's task has exited and no longer accepts input.
    #[error("channel closed for {0}")]
    ChannelClosed(SymbolKey),

    /// The symbol's inbound channel is full.
    #[error("channel full for {0}")]
    ChannelFull(SymbolKey),

    /// The symbol's task panicked or was aborted.
    #[error("task for {key} failed: {message}")]
    Join {
        /// Symbol whose task failed.
        key: SymbolKey,
        /// Error message.
        message: String,
    },
}

/// Error returned by a [`SnapshotSource`](crate::SnapshotSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport or HTTP failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The exchange does not know the symbol.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(SymbolKey),

    /// The response could not be turned into a snapshot.
    #[error("malformed snapshot: {message}")]
    Malformed {
        /// Error message.
        message: String,
    },
}

/// Error returned by an [`OrderBookPublisher`](crate::OrderBookPublisher).
#[derive(Debug, Error)]
pub enum PublishError {
    /// The downstream consumer is gone.
    #[error("publisher closed")]
    Closed,

    /// The downstream consumer refused the event.
    #[error("publish rejected: {message}")]
    Rejected {
        /// Error message.
        message: String,
    },
}
