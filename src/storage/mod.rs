//! Event log storage.
//!
//! This module contains:
//! - `EventStore` trait: append-only, totally ordered event log
//! - Storage configuration and factory
//! - Implementations: in-memory (default), SQLite, Mock

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use crate::event::{Event, Sequence, SequencedEvent};

pub mod memory;
pub mod mock;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryEventStore;
pub use mock::MockEventStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEventStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Event log exhausted: capacity of {capacity} events reached")]
    Exhausted { capacity: usize },

    #[error("Event data could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Interface for the append-only event log.
///
/// The store is the single source of truth for ordering: sequences are
/// assigned here, start at 1 and increase by exactly 1 per append.
///
/// Implementations:
/// - `InMemoryEventStore`: process-local log (default)
/// - `SqliteEventStore`: durable log in a SQLite file
/// - `MockEventStore`: failure injection for tests
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append an event and return the sequence assigned to it.
    async fn append(&self, event: Event) -> Result<Sequence>;

    /// Every stored event in append order.
    ///
    /// The result is a consistent snapshot at the moment of the call. Events
    /// appended concurrently may or may not be included, but nothing earlier
    /// is omitted or reordered.
    async fn read_all(&self) -> Result<Vec<SequencedEvent>>;

    /// Events with a sequence strictly greater than `after`, in order.
    async fn read_after(&self, after: Sequence) -> Result<Vec<SequencedEvent>>;

    /// Highest assigned sequence, or 0 for an empty log.
    async fn last_sequence(&self) -> Result<Sequence>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Storage backend discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Process-local log, lost on restart.
    #[default]
    Memory,
    /// Durable SQLite file.
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Database file path (SQLite only).
    pub path: String,
    /// Optional capacity bound for the in-memory log.
    pub max_events: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            path: "data/events.db".to_string(),
            max_events: None,
        }
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Initialize the event store selected by configuration.
///
/// SQLite requires the `sqlite` feature (included in default).
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn EventStore>> {
    match config.storage_type {
        StorageType::Memory => {
            info!(storage_type = "memory", max_events = ?config.max_events, "Event store initialized");
            let store = match config.max_events {
                Some(capacity) => InMemoryEventStore::with_capacity_limit(capacity),
                None => InMemoryEventStore::new(),
            };
            Ok(Arc::new(store))
        }
        StorageType::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                let store = SqliteEventStore::open(&config.path).await.map_err(|e| {
                    error!(path = %config.path, error = %e, "Failed to open SQLite event store");
                    e
                })?;
                info!(storage_type = "sqlite", path = %config.path, "Event store initialized");
                Ok(Arc::new(store))
            }

            #[cfg(not(feature = "sqlite"))]
            {
                error!("SQLite storage requested but 'sqlite' feature is not enabled");
                Err(StorageError::Unavailable(
                    "SQLite support requires the 'sqlite' feature".to_string(),
                ))
            }
        }
    }
}
