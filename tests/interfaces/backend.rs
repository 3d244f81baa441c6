//! Backend factory for interface tests.
//!
//! Provides a unified interface to create storage backends based on environment configuration.

use std::env;
use std::sync::Arc;

#[cfg(feature = "sqlite")]
use eventrelay::storage::SqliteEventStore;
use eventrelay::storage::{EventStore, InMemoryEventStore};

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl StorageBackend {
    pub fn from_env() -> Self {
        match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => StorageBackend::Sqlite,
            _ => StorageBackend::Memory,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

/// Holds the storage implementation for a backend.
pub struct StorageContext {
    pub event_store: Arc<dyn EventStore>,
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("event_store", &"<dyn EventStore>")
            .finish()
    }
}

impl StorageContext {
    /// Create a storage context for the configured backend.
    pub async fn new(backend: StorageBackend) -> Self {
        match backend {
            StorageBackend::Memory => Self::create_memory(None),
            StorageBackend::Sqlite => Self::create_sqlite().await,
        }
    }

    /// In-memory log that refuses appends past `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::create_memory(Some(capacity))
    }

    fn create_memory(capacity: Option<usize>) -> Self {
        let store = match capacity {
            Some(capacity) => InMemoryEventStore::with_capacity_limit(capacity),
            None => InMemoryEventStore::new(),
        };
        StorageContext {
            event_store: Arc::new(store),
        }
    }

    #[cfg(feature = "sqlite")]
    async fn create_sqlite() -> Self {
        let store = SqliteEventStore::open_in_memory()
            .await
            .expect("Failed to open in-memory SQLite");
        StorageContext {
            event_store: Arc::new(store),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    async fn create_sqlite() -> Self {
        panic!("SQLite feature not enabled. Build with --features sqlite");
    }
}
