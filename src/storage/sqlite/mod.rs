//! SQLite implementation of the event log.

mod event_store;

pub use event_store::SqliteEventStore;
