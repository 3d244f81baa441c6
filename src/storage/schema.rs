//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Events table schema.
#[derive(Iden)]
pub enum Events {
    Table,
    #[iden = "sequence"]
    Sequence,
    #[iden = "event_type"]
    EventType,
    #[iden = "data"]
    Data,
    #[iden = "created_at"]
    CreatedAt,
}

/// SQL for creating the events table.
///
/// `sequence` is the rowid alias; AUTOINCREMENT guarantees values are never
/// reused, so the log order is the rowid order.
pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;
