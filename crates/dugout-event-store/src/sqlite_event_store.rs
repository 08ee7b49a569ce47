//! `SQLite` implementation of the `EventStore` trait.
//!
//! The durable local variant: same version assignment and conflict rules as
//! the in-memory store, with each append committed in one transaction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dugout_core::clock::{Clock, SystemClock};
use dugout_core::error::DomainError;
use dugout_core::event_store::{
    AggregateType, EventStore, NewEvent, StoredEvent, StoredEventMetadata, type_filter_allows,
    validate_expected_version, validate_id, validate_stream_id,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::SqliteStoreConfig;
use crate::schema;

const INSERT_EVENT: &str = r"
INSERT INTO stored_events (
    event_id, stream_id, aggregate_type, event_type, event_data,
    event_version, stream_version, timestamp, metadata, game_id
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const SELECT_HEAD: &str =
    "SELECT COALESCE(MAX(stream_version), 0) FROM stored_events WHERE stream_id = ?";

const SELECT_STREAM: &str = r"
SELECT event_id, stream_id, aggregate_type, event_type, event_data,
       event_version, stream_version, timestamp, metadata
FROM stored_events
WHERE stream_id = ? AND stream_version > ?
ORDER BY stream_version ASC";

const SELECT_ALL: &str = r"
SELECT event_id, stream_id, aggregate_type, event_type, event_data,
       event_version, stream_version, timestamp, metadata
FROM stored_events
ORDER BY global_position ASC";

const SELECT_BY_TYPE: &str = r"
SELECT event_id, stream_id, aggregate_type, event_type, event_data,
       event_version, stream_version, timestamp, metadata
FROM stored_events
WHERE aggregate_type = ?
ORDER BY global_position ASC";

const SELECT_BY_GAME: &str = r"
SELECT event_id, stream_id, aggregate_type, event_type, event_data,
       event_version, stream_version, timestamp, metadata
FROM stored_events
WHERE game_id = ? OR stream_id = ?
ORDER BY global_position ASC";

const DELETE_STREAM: &str = "DELETE FROM stored_events WHERE stream_id = ?";

/// SQLite-backed event store.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteEventStore {
    /// Opens the database described by `config` and ensures the schema.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the database cannot be opened
    /// or migrated.
    pub async fn connect(config: &SqliteStoreConfig) -> Result<Self, DomainError> {
        let pool = schema::connect_pool(config).await?;
        schema::migrate(&pool).await?;
        Ok(Self::new(pool, Arc::new(SystemClock)))
    }

    /// Creates a store over an existing, migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// The underlying pool, for sharing with a `SqliteSnapshotStore`.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        query
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?
            .iter()
            .map(row_to_stored_event)
            .collect()
    }

    /// Classifies a failed append. A lock timeout while another writer moved
    /// the head is reported as the conflict it is.
    async fn conflict_or_infrastructure(
        &self,
        err: sqlx::Error,
        stream_id: &str,
        expected_version: i64,
    ) -> DomainError {
        if !is_busy(&err) {
            return infrastructure(err);
        }
        match self.current_version(stream_id).await {
            Ok(actual) if actual != expected_version => DomainError::ConcurrencyConflict {
                stream_id: stream_id.to_owned(),
                expected: expected_version,
                actual,
            },
            _ => infrastructure(err),
        }
    }
}

impl fmt::Debug for SqliteEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteEventStore")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// `SQLITE_BUSY` and its extended `SQLITE_BUSY_SNAPSHOT`.
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("5" | "517")),
        _ => false,
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DomainError::Infrastructure(format!("invalid stored timestamp {raw:?}: {e}")))
}

fn row_to_stored_event(row: &SqliteRow) -> Result<StoredEvent, DomainError> {
    let event_id: String = row.try_get("event_id").map_err(infrastructure)?;
    let aggregate_type: String = row.try_get("aggregate_type").map_err(infrastructure)?;
    let timestamp: String = row.try_get("timestamp").map_err(infrastructure)?;
    let metadata: String = row.try_get("metadata").map_err(infrastructure)?;

    Ok(StoredEvent {
        event_id: Uuid::parse_str(&event_id)
            .map_err(|e| DomainError::Infrastructure(format!("invalid stored event id: {e}")))?,
        stream_id: row.try_get("stream_id").map_err(infrastructure)?,
        aggregate_type: aggregate_type.parse()?,
        event_type: row.try_get("event_type").map_err(infrastructure)?,
        event_data: row.try_get("event_data").map_err(infrastructure)?,
        event_version: row.try_get("event_version").map_err(infrastructure)?,
        stream_version: row.try_get("stream_version").map_err(infrastructure)?,
        timestamp: parse_timestamp(&timestamp)?,
        metadata: serde_json::from_str::<StoredEventMetadata>(&metadata).map_err(|e| {
            DomainError::Infrastructure(format!("invalid stored event metadata: {e}"))
        })?,
    })
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn append(
        &self,
        stream_id: &str,
        aggregate_type: AggregateType,
        events: &[NewEvent],
        expected_version: i64,
    ) -> Result<(), DomainError> {
        validate_stream_id(stream_id)?;
        validate_expected_version(expected_version)?;
        if events.is_empty() {
            return Ok(());
        }

        let created_at = self.clock.now();
        // IMMEDIATE takes the write lock before the head is read, so racing
        // appends queue on the busy timeout instead of failing at commit.
        let mut tx = match self.pool.begin_with("BEGIN IMMEDIATE").await {
            Ok(tx) => tx,
            Err(e) => {
                return Err(self
                    .conflict_or_infrastructure(e, stream_id, expected_version)
                    .await);
            }
        };

        let actual: i64 = sqlx::query_scalar(SELECT_HEAD)
            .bind(stream_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(infrastructure)?;
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                stream_id: stream_id.to_owned(),
                expected: expected_version,
                actual,
            });
        }

        let mut stream_version = expected_version;
        for event in events {
            stream_version += 1;
            let stored =
                event
                    .clone()
                    .into_stored(stream_id, aggregate_type, stream_version, created_at);
            let metadata = serde_json::to_string(&stored.metadata).map_err(|e| {
                DomainError::Infrastructure(format!("metadata serialization failed: {e}"))
            })?;

            let inserted = sqlx::query(INSERT_EVENT)
                .bind(stored.event_id.to_string())
                .bind(&stored.stream_id)
                .bind(stored.aggregate_type.as_str())
                .bind(&stored.event_type)
                .bind(&stored.event_data)
                .bind(stored.event_version)
                .bind(stored.stream_version)
                .bind(format_timestamp(stored.timestamp))
                .bind(metadata)
                .bind(stored.metadata.game_id.map(|id| id.to_string()))
                .execute(&mut *tx)
                .await;

            match inserted {
                Ok(_) => {}
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    // Another writer claimed this version between our read and write.
                    drop(tx);
                    let actual = self.current_version(stream_id).await?;
                    return Err(DomainError::ConcurrencyConflict {
                        stream_id: stream_id.to_owned(),
                        expected: expected_version,
                        actual,
                    });
                }
                Err(e) => {
                    drop(tx);
                    return Err(self
                        .conflict_or_infrastructure(e, stream_id, expected_version)
                        .await);
                }
            }
        }

        if let Err(e) = tx.commit().await {
            return Err(self
                .conflict_or_infrastructure(e, stream_id, expected_version)
                .await);
        }

        tracing::debug!(
            stream_id,
            aggregate_type = %aggregate_type,
            expected_version,
            new_version = stream_version,
            event_count = events.len(),
            "appended events to sqlite stream"
        );
        Ok(())
    }

    async fn get_events(
        &self,
        stream_id: &str,
        from_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        validate_stream_id(stream_id)?;
        self.fetch(
            sqlx::query(SELECT_STREAM)
                .bind(stream_id)
                .bind(from_version.unwrap_or(0)),
        )
        .await
    }

    async fn get_all_events(&self) -> Result<Vec<StoredEvent>, DomainError> {
        self.fetch(sqlx::query(SELECT_ALL)).await
    }

    async fn get_events_by_type(
        &self,
        aggregate_type: AggregateType,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.fetch(sqlx::query(SELECT_BY_TYPE).bind(aggregate_type.as_str()))
            .await
    }

    async fn get_events_by_game_id(
        &self,
        game_id: Uuid,
        aggregate_types: Option<&[AggregateType]>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        validate_id(game_id, "game id")?;
        let game_key = game_id.to_string();
        let events = self
            .fetch(
                sqlx::query(SELECT_BY_GAME)
                    .bind(game_key.clone())
                    .bind(game_key),
            )
            .await?;
        Ok(events
            .into_iter()
            .filter(|event| type_filter_allows(aggregate_types, event.aggregate_type))
            .collect())
    }

    async fn current_version(&self, stream_id: &str) -> Result<i64, DomainError> {
        validate_stream_id(stream_id)?;
        sqlx::query_scalar(SELECT_HEAD)
            .bind(stream_id)
            .fetch_one(&self.pool)
            .await
            .map_err(infrastructure)
    }

    async fn delete(&self, stream_id: &str) -> Result<(), DomainError> {
        validate_stream_id(stream_id)?;
        let result = sqlx::query(DELETE_STREAM)
            .bind(stream_id)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        tracing::info!(
            stream_id,
            removed_events = result.rows_affected(),
            "deleted sqlite stream"
        );
        Ok(())
    }
}
