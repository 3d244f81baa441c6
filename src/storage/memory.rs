//! In-memory event log.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{EventStore, Result, StorageError};
use crate::event::{Event, Sequence, SequencedEvent, NO_SEQUENCE};

/// Event log held in process memory.
///
/// The log is a single vector; the sequence of an event is its index + 1.
/// An optional capacity bound turns "out of memory" into a recoverable
/// `StorageError::Exhausted` instead of an allocation failure.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<SequencedEvent>>,
    capacity: Option<usize>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that refuses appends beyond `capacity` events.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            capacity: Some(capacity),
        }
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: Event) -> Result<Sequence> {
        let mut events = self.events.write().await;
        if let Some(capacity) = self.capacity {
            if events.len() >= capacity {
                return Err(StorageError::Exhausted { capacity });
            }
        }

        let sequence = events.len() as Sequence + 1;
        debug!(sequence, event_type = %event.event_type, "Appended event");
        events.push(SequencedEvent::new(sequence, event));
        Ok(sequence)
    }

    async fn read_all(&self) -> Result<Vec<SequencedEvent>> {
        Ok(self.events.read().await.clone())
    }

    async fn read_after(&self, after: Sequence) -> Result<Vec<SequencedEvent>> {
        let events = self.events.read().await;
        // Sequence n lives at index n - 1, so the suffix after `after` starts at index `after`.
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(events.len());
        Ok(events[start..].to_vec())
    }

    async fn last_sequence(&self) -> Result<Sequence> {
        Ok(self
            .events
            .read()
            .await
            .last()
            .map(|e| e.sequence)
            .unwrap_or(NO_SEQUENCE))
    }
}
