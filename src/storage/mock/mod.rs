//! Mock EventStore implementation for testing.
//!
//! Behaves like the in-memory log but can be told to fail appends or reads,
//! which is how append failures are exercised without exhausting memory.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EventStore, InMemoryEventStore, Result, StorageError};
use crate::event::{Event, Sequence, SequencedEvent};

/// In-memory event store with switchable failures.
#[derive(Default)]
pub struct MockEventStore {
    inner: InMemoryEventStore,
    fail_on_append: RwLock<bool>,
    fail_on_read: RwLock<bool>,
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_append(&self, fail: bool) {
        *self.fail_on_append.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("mock read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn append(&self, event: Event) -> Result<Sequence> {
        if *self.fail_on_append.read().await {
            return Err(StorageError::Unavailable("mock append failure".to_string()));
        }
        self.inner.append(event).await
    }

    async fn read_all(&self) -> Result<Vec<SequencedEvent>> {
        self.check_read().await?;
        self.inner.read_all().await
    }

    async fn read_after(&self, after: Sequence) -> Result<Vec<SequencedEvent>> {
        self.check_read().await?;
        self.inner.read_after(after).await
    }

    async fn last_sequence(&self) -> Result<Sequence> {
        self.check_read().await?;
        self.inner.last_sequence().await
    }
}
