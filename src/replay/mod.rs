//! Replay feed: read-only access to the full event history.
//!
//! Subscribers use it at startup to rebuild their view, and whenever a live
//! delivery reveals a gap. Reading never blocks or interferes with live
//! broadcasts.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{BusError, Result};
use crate::event::{Sequence, SequencedEvent, NO_SEQUENCE};
use crate::storage::EventStore;

/// Source of historical events.
#[async_trait]
pub trait ReplayFeed: Send + Sync {
    /// Every event ever appended, in sequence order.
    async fn fetch_history(&self) -> Result<Vec<SequencedEvent>>;

    /// Events with a sequence strictly greater than `after`.
    ///
    /// The default fetches everything and filters; implementations with a
    /// cheaper suffix read should override it.
    async fn fetch_history_after(&self, after: Sequence) -> Result<Vec<SequencedEvent>> {
        let mut events = self.fetch_history().await?;
        events.retain(|e| e.sequence > after);
        Ok(events)
    }

    /// Highest sequence in the log, or `NO_SEQUENCE` when it is empty.
    async fn last_sequence(&self) -> Result<Sequence> {
        let events = self.fetch_history().await?;
        Ok(events.last().map_or(NO_SEQUENCE, |e| e.sequence))
    }
}

/// In-process replay feed over an event store.
#[derive(Clone)]
pub struct StoreReplayFeed {
    store: Arc<dyn EventStore>,
}

impl StoreReplayFeed {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReplayFeed for StoreReplayFeed {
    async fn fetch_history(&self) -> Result<Vec<SequencedEvent>> {
        self.store.read_all().await.map_err(BusError::from)
    }

    async fn fetch_history_after(&self, after: Sequence) -> Result<Vec<SequencedEvent>> {
        self.store.read_after(after).await.map_err(BusError::from)
    }

    async fn last_sequence(&self) -> Result<Sequence> {
        self.store.last_sequence().await.map_err(BusError::from)
    }
}
