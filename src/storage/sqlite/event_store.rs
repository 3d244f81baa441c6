//! SQLite EventStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::event::{Event, Sequence, SequencedEvent, NO_SEQUENCE};
use crate::storage::schema::{Events, CREATE_EVENTS_TABLE};
use crate::storage::{EventStore, Result};

/// SQLite implementation of EventStore.
///
/// The event sequence is the table's rowid, so ordering and gap-free
/// numbering come from SQLite itself.
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Create a new SQLite event store over an existing pool.
    ///
    /// Call [`init`](Self::init) before use.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and initialize the schema.
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path)).await?;
        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    /// Open a private in-memory database.
    ///
    /// Pinned to a single connection: every SQLite `:memory:` connection is
    /// its own database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_EVENTS_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    fn decode_row(row: &SqliteRow) -> Result<SequencedEvent> {
        let sequence: i64 = row.try_get("sequence")?;
        let event_type: String = row.try_get("event_type")?;
        let data: String = row.try_get("data")?;

        Ok(SequencedEvent::new(
            sequence as Sequence,
            Event::new(event_type, serde_json::from_str(&data)?),
        ))
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn append(&self, event: Event) -> Result<Sequence> {
        let data = serde_json::to_string(&event.data)?;

        let query = Query::insert()
            .into_table(Events::Table)
            .columns([Events::EventType, Events::Data, Events::CreatedAt])
            .values_panic([
                event.event_type.into(),
                data.into(),
                Utc::now().to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.last_insert_rowid() as Sequence)
    }

    async fn read_all(&self) -> Result<Vec<SequencedEvent>> {
        self.read_after(NO_SEQUENCE).await
    }

    async fn read_after(&self, after: Sequence) -> Result<Vec<SequencedEvent>> {
        let query = Query::select()
            .columns([Events::Sequence, Events::EventType, Events::Data])
            .from(Events::Table)
            .and_where(Expr::col(Events::Sequence).gt(after as i64))
            .order_by(Events::Sequence, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            events.push(Self::decode_row(row)?);
        }

        Ok(events)
    }

    async fn last_sequence(&self) -> Result<Sequence> {
        let query = Query::select()
            .expr(Expr::col(Events::Sequence).max())
            .from(Events::Table)
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        let max_seq: Option<i64> = row.try_get(0)?;
        Ok(max_seq.map(|s| s as Sequence).unwrap_or(NO_SEQUENCE))
    }
}
