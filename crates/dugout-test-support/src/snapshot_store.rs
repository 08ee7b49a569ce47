//! Test snapshot store.

use async_trait::async_trait;
use dugout_core::error::DomainError;
use dugout_core::event_store::AggregateType;
use dugout_core::snapshot::{Snapshot, SnapshotStore};

/// A snapshot store whose every read and write fails. The frequency is still
/// reported, so snapshot writes are attempted.
#[derive(Debug)]
pub struct FailingSnapshotStore {
    /// Reported snapshot frequency.
    pub frequency: u64,
}

fn unavailable() -> DomainError {
    DomainError::Snapshot("snapshot store unavailable".into())
}

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn save(
        &self,
        _aggregate_id: &str,
        _aggregate_type: AggregateType,
        _version: i64,
        _data: serde_json::Value,
    ) -> Result<(), DomainError> {
        Err(unavailable())
    }

    async fn find_latest(&self, _aggregate_id: &str) -> Result<Option<Snapshot>, DomainError> {
        Err(unavailable())
    }

    fn snapshot_frequency(&self) -> u64 {
        self.frequency
    }

    async fn delete(&self, _aggregate_id: &str) -> Result<(), DomainError> {
        Err(unavailable())
    }
}
