//! Output publishing.

use crate::error::PublishError;
use async_trait::async_trait;
use booksync_core::OrderBookEvent;
use tokio::sync::mpsc;

/// Downstream consumer of validated order book events.
///
/// Called one event at a time per symbol; an implementation applies
/// backpressure by not returning until it can accept the event.
#[async_trait]
pub trait OrderBookPublisher: Send + Sync {
    /// Hands one event downstream.
    ///
    /// # Errors
    /// Returns [`PublishError`] if the event cannot be delivered.
    async fn publish(&self, event: OrderBookEvent) -> Result<(), PublishError>;
}

/// Publisher backed by a bounded tokio channel.
///
/// A full channel blocks the publishing symbol, which the runtime bounds with
/// its publish timeout.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<OrderBookEvent>,
}

impl ChannelPublisher {
    /// Creates a publisher and the receiver consuming its events.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OrderBookEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl OrderBookPublisher for ChannelPublisher {
    async fn publish(&self, event: OrderBookEvent) -> Result<(), PublishError> {
        self.tx.send(event).await.map_err(|_| PublishError::Closed)
    }
}
