//! Snapshot policy and snapshot-aware stream loading.
//!
//! The snapshot store is an optimisation over the event log, never a
//! replacement for it: every fault here degrades to a full read, and a failed
//! snapshot write never fails the save that triggered it.

use std::sync::Arc;

use dugout_core::aggregate::Snapshottable;
use dugout_core::error::DomainError;
use dugout_core::event_store::{AggregateType, EventStore, StoredEvent};
use dugout_core::snapshot::{Snapshot, SnapshotStore};
use tracing::{debug, info, warn};

/// What happened when a save asked for a snapshot.
#[derive(Debug)]
pub enum SnapshotOutcome {
    /// A snapshot was written at `version`.
    Written {
        /// The stream version captured.
        version: i64,
    },
    /// The policy did not call for a snapshot.
    NotDue,
    /// The snapshot could not be written. Callers log and discard this.
    Failed(DomainError),
}

/// A stream read, optionally starting from a snapshot.
#[derive(Debug, Clone)]
pub struct LoadedStream {
    /// The snapshot the read started from, if one was usable.
    pub snapshot: Option<Snapshot>,
    /// Events after the snapshot, or the whole stream without one.
    pub subsequent_events: Vec<StoredEvent>,
    /// Stream version reached by the snapshot plus `subsequent_events`.
    pub version: i64,
    /// Whether `snapshot` seeds the reconstruction.
    pub reconstructed_from_snapshot: bool,
}

/// Decides when snapshots are written and how streams are read back.
#[derive(Clone)]
pub struct SnapshotManager {
    snapshots: Arc<dyn SnapshotStore>,
    events: Arc<dyn EventStore>,
}

impl std::fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotManager")
            .field("frequency", &self.snapshots.snapshot_frequency())
            .finish_non_exhaustive()
    }
}

impl SnapshotManager {
    /// Creates a manager over a snapshot store and the event store it shadows.
    #[must_use]
    pub fn new(snapshots: Arc<dyn SnapshotStore>, events: Arc<dyn EventStore>) -> Self {
        Self { snapshots, events }
    }

    /// Stream versions between snapshots, as configured on the store.
    #[must_use]
    pub fn frequency(&self) -> u64 {
        self.snapshots.snapshot_frequency()
    }

    /// Returns `true` when the stream has advanced at least one full
    /// frequency interval past its latest snapshot. Faults count as "not due".
    pub async fn should_create_snapshot(&self, aggregate_id: &str) -> bool {
        match self.snapshot_due(aggregate_id).await {
            Ok(due) => due,
            Err(err) => {
                warn!(aggregate_id, error = %err, "could not evaluate snapshot policy");
                false
            }
        }
    }

    async fn snapshot_due(&self, aggregate_id: &str) -> Result<bool, DomainError> {
        let frequency = self.frequency();
        if frequency == 0 {
            return Ok(false);
        }
        let interval = i64::try_from(frequency).unwrap_or(i64::MAX);
        let head = self.events.current_version(aggregate_id).await?;
        let last_snapshot = self
            .snapshots
            .find_latest(aggregate_id)
            .await?
            .map_or(0, |snapshot| snapshot.version);
        Ok(head >= last_snapshot.saturating_add(interval))
    }

    /// Captures the aggregate's state at its current version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Snapshot` if the state cannot be serialized or
    /// the snapshot store rejects the write.
    pub async fn create_snapshot<A: Snapshottable>(&self, aggregate: &A) -> Result<i64, DomainError> {
        let aggregate_id = aggregate.aggregate_id().to_string();
        let version = aggregate.version();
        let data = serde_json::to_value(aggregate.snapshot_state()).map_err(|e| {
            DomainError::Snapshot(format!("snapshot serialization failed for {aggregate_id}: {e}"))
        })?;
        self.snapshots
            .save(&aggregate_id, A::AGGREGATE_TYPE, version, data)
            .await?;
        info!(
            aggregate_id,
            aggregate_type = %A::AGGREGATE_TYPE,
            version,
            "snapshot written"
        );
        Ok(version)
    }

    /// Writes a snapshot if one is due. Never returns an error: failures come
    /// back as [`SnapshotOutcome::Failed`].
    pub async fn maybe_snapshot<A: Snapshottable>(&self, aggregate: &A) -> SnapshotOutcome {
        let aggregate_id = aggregate.aggregate_id().to_string();
        match self.snapshot_due(&aggregate_id).await {
            Ok(false) => SnapshotOutcome::NotDue,
            Ok(true) => match self.create_snapshot(aggregate).await {
                Ok(version) => SnapshotOutcome::Written { version },
                Err(err) => SnapshotOutcome::Failed(err),
            },
            Err(err) => SnapshotOutcome::Failed(err),
        }
    }

    /// Reads a stream starting from its latest usable snapshot.
    ///
    /// A snapshot is usable when it belongs to `aggregate_type` and is not
    /// ahead of the stream head. Without one the whole stream is returned.
    ///
    /// # Errors
    ///
    /// Returns the event store's error if the stream cannot be read. Snapshot
    /// store faults are logged and never returned.
    pub async fn load_aggregate(
        &self,
        aggregate_id: &str,
        aggregate_type: AggregateType,
    ) -> Result<LoadedStream, DomainError> {
        if let Some(snapshot) = self.usable_snapshot(aggregate_id, aggregate_type).await? {
            // Read from the event the snapshot captured, to check it is still there.
            let mut subsequent_events = self
                .events
                .get_events(aggregate_id, Some(snapshot.version - 1))
                .await?;
            if captured_by(&subsequent_events, &snapshot) {
                subsequent_events.remove(0);
                let version = subsequent_events
                    .last()
                    .map_or(snapshot.version, |event| event.stream_version);
                debug!(
                    aggregate_id,
                    snapshot_version = snapshot.version,
                    suffix_len = subsequent_events.len(),
                    "loaded stream from snapshot"
                );
                return Ok(LoadedStream {
                    snapshot: Some(snapshot),
                    subsequent_events,
                    version,
                    reconstructed_from_snapshot: true,
                });
            }
            warn!(
                aggregate_id,
                snapshot_version = snapshot.version,
                "ignoring snapshot older than the stream it claims to cover"
            );
        }

        let events = self.events.get_events(aggregate_id, None).await?;
        let version = events.last().map_or(0, |event| event.stream_version);
        Ok(LoadedStream {
            snapshot: None,
            subsequent_events: events,
            version,
            reconstructed_from_snapshot: false,
        })
    }

    async fn usable_snapshot(
        &self,
        aggregate_id: &str,
        aggregate_type: AggregateType,
    ) -> Result<Option<Snapshot>, DomainError> {
        let snapshot = match self.snapshots.find_latest(aggregate_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(aggregate_id, error = %err, "snapshot read failed, replaying full stream");
                return Ok(None);
            }
        };

        if snapshot.aggregate_type != aggregate_type {
            warn!(
                aggregate_id,
                expected = %aggregate_type,
                found = %snapshot.aggregate_type,
                "ignoring snapshot of another aggregate type"
            );
            return Ok(None);
        }

        let head = self.events.current_version(aggregate_id).await?;
        if snapshot.version > head {
            warn!(
                aggregate_id,
                snapshot_version = snapshot.version,
                head,
                "ignoring snapshot ahead of the stream head"
            );
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    /// Removes every snapshot of an aggregate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Snapshot` if the snapshot store fails.
    pub async fn delete_snapshots(&self, aggregate_id: &str) -> Result<(), DomainError> {
        self.snapshots.delete(aggregate_id).await
    }
}

/// Returns `true` if `events` starts with the event at the snapshot's
/// version and that event was stored no later than the snapshot. A stream
/// deleted and rewritten after the snapshot fails this check.
fn captured_by(events: &[StoredEvent], snapshot: &Snapshot) -> bool {
    events.first().is_some_and(|event| {
        event.stream_version == snapshot.version && event.metadata.created_at <= snapshot.timestamp
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dugout_core::aggregate::AggregateRoot;
    use dugout_core::event_store::NewEvent;
    use dugout_event_store::{InMemoryEventStore, InMemorySnapshotStore, SnapshotConfig};
    use dugout_test_support::{FailingEventStore, FailingSnapshotStore, init_tracing};

    use super::*;
    use crate::test_aggregate::{Tally, fixed_clock};

    fn stores(frequency: u64) -> (Arc<InMemoryEventStore>, Arc<InMemorySnapshotStore>) {
        (
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new(SnapshotConfig { frequency })),
        )
    }

    async fn append_tally(events: &InMemoryEventStore, tally: &Tally, expected: i64) {
        let new_events: Vec<NewEvent> = tally
            .uncommitted_events()
            .iter()
            .map(|e| NewEvent::from_domain_event(e, "test").unwrap())
            .collect();
        events
            .append(
                &tally.aggregate_id().to_string(),
                AggregateType::Game,
                &new_events,
                expected,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_should_create_snapshot_when_head_reaches_frequency() {
        // Arrange
        let (events, snapshots) = stores(3);
        let mut tally = Tally::open("outs", &fixed_clock());
        tally.increment(1, &fixed_clock());
        tally.increment(1, &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let manager = SnapshotManager::new(snapshots, events);

        // Act
        let due = manager
            .should_create_snapshot(&tally.aggregate_id().to_string())
            .await;

        // Assert
        assert!(due);
    }

    #[tokio::test]
    async fn test_should_not_create_snapshot_below_frequency() {
        let (events, snapshots) = stores(10);
        let tally = Tally::open("outs", &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let manager = SnapshotManager::new(snapshots, events);

        assert!(
            !manager
                .should_create_snapshot(&tally.aggregate_id().to_string())
                .await
        );
    }

    #[tokio::test]
    async fn test_zero_frequency_disables_snapshots() {
        let (events, snapshots) = stores(0);
        let mut tally = Tally::open("outs", &fixed_clock());
        tally.increment(4, &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let manager = SnapshotManager::new(snapshots.clone(), events);

        let outcome = manager.maybe_snapshot(&tally).await;

        assert!(matches!(outcome, SnapshotOutcome::NotDue));
        assert!(
            snapshots
                .snapshots_of(&tally.aggregate_id().to_string())
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_maybe_snapshot_writes_at_current_version() {
        // Arrange
        let (events, snapshots) = stores(2);
        let mut tally = Tally::open("runs", &fixed_clock());
        tally.increment(5, &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let manager = SnapshotManager::new(snapshots.clone(), events);

        // Act
        let outcome = manager.maybe_snapshot(&tally).await;

        // Assert
        assert!(matches!(outcome, SnapshotOutcome::Written { version: 2 }));
        let written = snapshots.snapshots_of(&tally.aggregate_id().to_string());
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].version, 2);
        assert_eq!(written[0].aggregate_type, AggregateType::Game);
        assert_eq!(written[0].data["total"], 5);
    }

    #[tokio::test]
    async fn test_batch_that_jumps_past_interval_still_snapshots() {
        let (events, snapshots) = stores(2);
        let mut tally = Tally::open("runs", &fixed_clock());
        for _ in 0..2 {
            tally.increment(1, &fixed_clock());
        }
        append_tally(&events, &tally, 0).await;
        let manager = SnapshotManager::new(snapshots, events);

        assert!(matches!(
            manager.maybe_snapshot(&tally).await,
            SnapshotOutcome::Written { version: 3 }
        ));
    }

    #[tokio::test]
    async fn test_maybe_snapshot_reports_store_failure_as_outcome() {
        let (events, _) = stores(1);
        let tally = Tally::open("runs", &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let manager = SnapshotManager::new(Arc::new(FailingSnapshotStore { frequency: 1 }), events);

        let outcome = manager.maybe_snapshot(&tally).await;

        assert!(matches!(
            outcome,
            SnapshotOutcome::Failed(DomainError::Snapshot(_))
        ));
    }

    #[tokio::test]
    async fn test_load_aggregate_reads_only_events_after_snapshot() {
        // Arrange
        let (events, snapshots) = stores(2);
        let mut tally = Tally::open("runs", &fixed_clock());
        tally.increment(1, &fixed_clock());
        append_tally(&events, &tally, 0).await;
        tally.mark_events_as_committed();
        let manager = SnapshotManager::new(snapshots, events.clone());
        manager.create_snapshot(&tally).await.unwrap();

        tally.increment(2, &fixed_clock());
        tally.increment(3, &fixed_clock());
        append_tally(&events, &tally, 2).await;

        // Act
        let loaded = manager
            .load_aggregate(&tally.aggregate_id().to_string(), AggregateType::Game)
            .await
            .unwrap();

        // Assert
        assert!(loaded.reconstructed_from_snapshot);
        assert_eq!(loaded.snapshot.as_ref().map(|s| s.version), Some(2));
        let versions: Vec<i64> = loaded
            .subsequent_events
            .iter()
            .map(|e| e.stream_version)
            .collect();
        assert_eq!(versions, vec![3, 4]);
        assert_eq!(loaded.version, 4);
    }

    #[tokio::test]
    async fn test_load_aggregate_without_snapshot_reads_full_stream() {
        let (events, snapshots) = stores(10);
        let mut tally = Tally::open("runs", &fixed_clock());
        tally.increment(1, &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let manager = SnapshotManager::new(snapshots, events);

        let loaded = manager
            .load_aggregate(&tally.aggregate_id().to_string(), AggregateType::Game)
            .await
            .unwrap();

        assert!(!loaded.reconstructed_from_snapshot);
        assert!(loaded.snapshot.is_none());
        assert_eq!(loaded.subsequent_events.len(), 2);
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_load_aggregate_ignores_snapshot_of_other_type() {
        init_tracing();
        let (events, snapshots) = stores(10);
        let tally = Tally::open("runs", &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let id = tally.aggregate_id().to_string();
        snapshots
            .save(&id, AggregateType::InningState, 1, serde_json::json!({}))
            .await
            .unwrap();
        let manager = SnapshotManager::new(snapshots, events);

        let loaded = manager.load_aggregate(&id, AggregateType::Game).await.unwrap();

        assert!(!loaded.reconstructed_from_snapshot);
        assert_eq!(loaded.subsequent_events.len(), 1);
    }

    #[tokio::test]
    async fn test_load_aggregate_ignores_snapshot_ahead_of_stream() {
        let (events, snapshots) = stores(10);
        let tally = Tally::open("runs", &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let id = tally.aggregate_id().to_string();
        snapshots
            .save(&id, AggregateType::Game, 9, serde_json::json!({}))
            .await
            .unwrap();
        let manager = SnapshotManager::new(snapshots, events);

        let loaded = manager.load_aggregate(&id, AggregateType::Game).await.unwrap();

        assert!(!loaded.reconstructed_from_snapshot);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_load_aggregate_degrades_to_full_read_when_snapshot_store_fails() {
        init_tracing();
        let (events, _) = stores(10);
        let tally = Tally::open("runs", &fixed_clock());
        append_tally(&events, &tally, 0).await;
        let manager = SnapshotManager::new(Arc::new(FailingSnapshotStore { frequency: 10 }), events);

        let loaded = manager
            .load_aggregate(&tally.aggregate_id().to_string(), AggregateType::Game)
            .await
            .unwrap();

        assert!(!loaded.reconstructed_from_snapshot);
        assert_eq!(loaded.subsequent_events.len(), 1);
    }

    #[tokio::test]
    async fn test_load_aggregate_propagates_event_store_failure() {
        let (_, snapshots) = stores(10);
        let manager = SnapshotManager::new(snapshots, Arc::new(FailingEventStore));

        let result = manager.load_aggregate("game-1", AggregateType::Game).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_should_create_snapshot_is_false_when_event_store_fails() {
        let (_, snapshots) = stores(1);
        let manager = SnapshotManager::new(snapshots, Arc::new(FailingEventStore));

        assert!(!manager.should_create_snapshot("game-1").await);
    }
}
