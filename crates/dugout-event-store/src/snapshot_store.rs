//! Snapshot store implementations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dugout_core::clock::{Clock, SystemClock};
use dugout_core::error::DomainError;
use dugout_core::event_store::{AggregateType, validate_stream_id};
use dugout_core::snapshot::{Snapshot, SnapshotStore};
use parking_lot::RwLock;
use sqlx::{Row, SqlitePool};

use crate::config::SnapshotConfig;

/// Snapshot store kept in process memory. Keeps every snapshot written, so
/// the latest is always the one with the highest version.
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Vec<Snapshot>>>,
    config: SnapshotConfig,
    clock: Arc<dyn Clock>,
}

impl InMemorySnapshotStore {
    /// Creates an empty store with the given policy.
    #[must_use]
    pub fn new(config: SnapshotConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(config: SnapshotConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Every snapshot held for an aggregate, oldest first.
    #[must_use]
    pub fn snapshots_of(&self, aggregate_id: &str) -> Vec<Snapshot> {
        self.snapshots
            .read()
            .get(aggregate_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl fmt::Debug for InMemorySnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySnapshotStore")
            .field("aggregates", &self.snapshots.read().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(
        &self,
        aggregate_id: &str,
        aggregate_type: AggregateType,
        version: i64,
        data: serde_json::Value,
    ) -> Result<(), DomainError> {
        validate_stream_id(aggregate_id)?;
        let snapshot = Snapshot {
            aggregate_id: aggregate_id.to_owned(),
            aggregate_type,
            version,
            data,
            timestamp: self.clock.now(),
        };
        let mut snapshots = self.snapshots.write();
        let history = snapshots.entry(aggregate_id.to_owned()).or_default();
        history.retain(|existing| existing.version != version);
        history.push(snapshot);
        history.sort_by_key(|s| s.version);
        Ok(())
    }

    async fn find_latest(&self, aggregate_id: &str) -> Result<Option<Snapshot>, DomainError> {
        validate_stream_id(aggregate_id)?;
        Ok(self
            .snapshots
            .read()
            .get(aggregate_id)
            .and_then(|history| history.last().cloned()))
    }

    fn snapshot_frequency(&self) -> u64 {
        self.config.frequency
    }

    async fn delete(&self, aggregate_id: &str) -> Result<(), DomainError> {
        validate_stream_id(aggregate_id)?;
        self.snapshots.write().remove(aggregate_id);
        Ok(())
    }
}

const UPSERT_SNAPSHOT: &str = r"
INSERT OR REPLACE INTO snapshots (aggregate_id, aggregate_type, version, data, timestamp)
VALUES (?, ?, ?, ?, ?)";

const SELECT_LATEST_SNAPSHOT: &str = r"
SELECT aggregate_id, aggregate_type, version, data, timestamp
FROM snapshots
WHERE aggregate_id = ?
ORDER BY version DESC
LIMIT 1";

const DELETE_SNAPSHOTS: &str = "DELETE FROM snapshots WHERE aggregate_id = ?";

/// SQLite-backed snapshot store. Shares the schema (and usually the pool) of
/// the `SqliteEventStore`.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
    config: SnapshotConfig,
    clock: Arc<dyn Clock>,
}

impl SqliteSnapshotStore {
    /// Creates a snapshot store over an existing, migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool, config: SnapshotConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            config,
            clock,
        }
    }
}

impl fmt::Debug for SqliteSnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteSnapshotStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn snapshot_error(err: impl fmt::Display) -> DomainError {
    DomainError::Snapshot(err.to_string())
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn save(
        &self,
        aggregate_id: &str,
        aggregate_type: AggregateType,
        version: i64,
        data: serde_json::Value,
    ) -> Result<(), DomainError> {
        validate_stream_id(aggregate_id)?;
        let timestamp = self.clock.now().to_rfc3339_opts(SecondsFormat::AutoSi, true);
        sqlx::query(UPSERT_SNAPSHOT)
            .bind(aggregate_id)
            .bind(aggregate_type.as_str())
            .bind(version)
            .bind(data.to_string())
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(snapshot_error)?;
        Ok(())
    }

    async fn find_latest(&self, aggregate_id: &str) -> Result<Option<Snapshot>, DomainError> {
        validate_stream_id(aggregate_id)?;
        let Some(row) = sqlx::query(SELECT_LATEST_SNAPSHOT)
            .bind(aggregate_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(snapshot_error)?
        else {
            return Ok(None);
        };

        let aggregate_type: String = row.try_get("aggregate_type").map_err(snapshot_error)?;
        let data: String = row.try_get("data").map_err(snapshot_error)?;
        let timestamp: String = row.try_get("timestamp").map_err(snapshot_error)?;

        Ok(Some(Snapshot {
            aggregate_id: row.try_get("aggregate_id").map_err(snapshot_error)?,
            aggregate_type: aggregate_type.parse().map_err(snapshot_error)?,
            version: row.try_get("version").map_err(snapshot_error)?,
            data: serde_json::from_str(&data).map_err(snapshot_error)?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(snapshot_error)?,
        }))
    }

    fn snapshot_frequency(&self) -> u64 {
        self.config.frequency
    }

    async fn delete(&self, aggregate_id: &str) -> Result<(), DomainError> {
        validate_stream_id(aggregate_id)?;
        sqlx::query(DELETE_SNAPSHOTS)
            .bind(aggregate_id)
            .execute(&self.pool)
            .await
            .map_err(snapshot_error)?;
        Ok(())
    }
}
