//! Snapshot storage contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::event_store::AggregateType;

/// A point-in-time projection of an aggregate's state.
///
/// Only valid together with the events of the same stream whose stream
/// version is greater than `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Identifier of the aggregate (its stream id).
    pub aggregate_id: String,
    /// Type of the aggregate.
    pub aggregate_type: AggregateType,
    /// Stream version at which the snapshot was taken.
    pub version: i64,
    /// Plain-data projection of the aggregate state.
    pub data: serde_json::Value,
    /// When the snapshot was written.
    pub timestamp: DateTime<Utc>,
}

/// Persistence for snapshots. Subordinate to the event store: the event log
/// stays the source of truth, so callers must tolerate every failure here.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Stores a snapshot taken at `version`.
    async fn save(
        &self,
        aggregate_id: &str,
        aggregate_type: AggregateType,
        version: i64,
        data: serde_json::Value,
    ) -> Result<(), DomainError>;

    /// Returns the snapshot with the highest version for an aggregate.
    async fn find_latest(&self, aggregate_id: &str) -> Result<Option<Snapshot>, DomainError>;

    /// Number of stream versions between snapshots. 0 disables snapshotting.
    fn snapshot_frequency(&self) -> u64;

    /// Removes every snapshot of an aggregate.
    async fn delete(&self, aggregate_id: &str) -> Result<(), DomainError>;
}
