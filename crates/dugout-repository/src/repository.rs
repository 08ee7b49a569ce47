//! Generic event-sourced repository.
//!
//! One instance per aggregate type, all sharing a single event store. Each
//! aggregate lives in the stream named by its identifier, so isolation
//! between aggregates is by stream id alone.

use std::marker::PhantomData;
use std::sync::Arc;

use dugout_core::aggregate::{AggregateRoot, Snapshottable, event_count};
use dugout_core::error::DomainError;
use dugout_core::event::decode_event;
use dugout_core::event_store::{EventStore, NewEvent, StoredEvent, validate_id};
use dugout_core::snapshot::Snapshot;
use dugout_core::stream::group_by_stream;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::snapshot_manager::{SnapshotManager, SnapshotOutcome};

/// An aggregate rebuilt from one stream of a cross-stream scan.
#[derive(Debug)]
pub struct ReplayedStream<A> {
    /// The reconstructed aggregate.
    pub aggregate: A,
    /// Index in the scanned event list of the stream's last event.
    pub last_seen: usize,
}

/// Decodes stored events and replays them into an aggregate.
///
/// Returns `Ok(None)` for an empty list.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` if a payload cannot be decoded or
/// the aggregate rejects the sequence.
pub fn reconstruct<A: AggregateRoot>(events: &[StoredEvent]) -> Result<Option<A>, DomainError> {
    if events.is_empty() {
        return Ok(None);
    }
    let decoded = events
        .iter()
        .map(decode_event::<A::Event>)
        .collect::<Result<Vec<_>, _>>()?;
    A::from_events(&decoded).map(Some)
}

/// Groups a scan by stream, keeping only streams of `A`'s type, and rebuilds
/// one aggregate per stream. Streams come back in order of first appearance.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` if any stream cannot be replayed.
pub fn reconstruct_streams<A: AggregateRoot>(
    events: &[StoredEvent],
) -> Result<Vec<ReplayedStream<A>>, DomainError> {
    let mut replayed = Vec::new();
    for group in group_by_stream(events, A::AGGREGATE_TYPE) {
        if let Some(aggregate) = reconstruct::<A>(&group.events)? {
            replayed.push(ReplayedStream {
                aggregate,
                last_seen: group.last_seen,
            });
        }
    }
    Ok(replayed)
}

/// Saves and loads aggregates of type `A` through an [`EventStore`].
pub struct EventSourcedRepository<A> {
    events: Arc<dyn EventStore>,
    snapshots: Option<SnapshotManager>,
    source: String,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for EventSourcedRepository<A> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            snapshots: self.snapshots.clone(),
            source: self.source.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<A: AggregateRoot> std::fmt::Debug for EventSourcedRepository<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourcedRepository")
            .field("aggregate_type", &A::AGGREGATE_TYPE)
            .field("snapshots", &self.snapshots)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<A: Snapshottable> EventSourcedRepository<A> {
    /// Creates a repository that replays full streams. `source` is recorded
    /// as provenance on every event it appends.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>, source: impl Into<String>) -> Self {
        Self {
            events,
            snapshots: None,
            source: source.into(),
            _aggregate: PhantomData,
        }
    }

    /// Attaches a snapshot manager.
    #[must_use]
    pub fn with_snapshots(mut self, manager: SnapshotManager) -> Self {
        self.snapshots = Some(manager);
        self
    }

    /// The shared event store, for type-specific scans.
    #[must_use]
    pub fn event_store(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    /// Appends the aggregate's uncommitted events and marks them committed.
    ///
    /// The expected stream head is the aggregate's version minus its
    /// uncommitted events. On any error the aggregate keeps its uncommitted
    /// events. A snapshot fault after a successful append is logged and
    /// never returned.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if the stream moved,
    /// `DomainError::Reconstruction` if an event cannot be serialized, or the
    /// store's error otherwise.
    #[instrument(skip_all, fields(aggregate_type = %A::AGGREGATE_TYPE, aggregate_id = %aggregate.aggregate_id()))]
    pub async fn save(&self, aggregate: &mut A) -> Result<(), DomainError> {
        let aggregate_id = aggregate.aggregate_id();
        validate_id(aggregate_id, "aggregate id")?;

        let uncommitted = aggregate.uncommitted_events();
        let expected_version = aggregate.version() - event_count(uncommitted);
        let new_events = uncommitted
            .iter()
            .map(|event| NewEvent::from_domain_event(event, &self.source))
            .collect::<Result<Vec<_>, _>>()?;

        self.events
            .append(
                &aggregate_id.to_string(),
                A::AGGREGATE_TYPE,
                &new_events,
                expected_version,
            )
            .await?;
        aggregate.mark_events_as_committed();
        debug!(
            expected_version,
            event_count = new_events.len(),
            "saved aggregate"
        );

        if new_events.is_empty() {
            return Ok(());
        }
        if let Some(manager) = &self.snapshots {
            match manager.maybe_snapshot(aggregate).await {
                SnapshotOutcome::Written { version } => debug!(version, "snapshot taken on save"),
                SnapshotOutcome::NotDue => {}
                SnapshotOutcome::Failed(err) => {
                    warn!(error = %err, "snapshot after save failed, events are committed");
                }
            }
        }
        Ok(())
    }

    /// Rebuilds the aggregate stored under `id`, or `None` if its stream is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a nil id,
    /// `DomainError::Reconstruction` if the stream cannot be replayed, or the
    /// event store's error.
    #[instrument(skip_all, fields(aggregate_type = %A::AGGREGATE_TYPE, aggregate_id = %id))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<A>, DomainError> {
        validate_id(id, "aggregate id")?;
        let stream_id = id.to_string();

        let Some(manager) = &self.snapshots else {
            let events = self.events.get_events(&stream_id, None).await?;
            return reconstruct(&events);
        };

        let loaded = manager.load_aggregate(&stream_id, A::AGGREGATE_TYPE).await?;
        let Some(snapshot) = loaded.snapshot else {
            return reconstruct(&loaded.subsequent_events);
        };

        match restore_snapshot::<A>(&snapshot) {
            Ok(mut aggregate) => {
                for stored in &loaded.subsequent_events {
                    aggregate.apply(&decode_event::<A::Event>(stored)?)?;
                }
                debug!(
                    snapshot_version = snapshot.version,
                    version = aggregate.version(),
                    "rebuilt aggregate from snapshot"
                );
                Ok(Some(aggregate))
            }
            Err(err) => {
                warn!(
                    snapshot_version = snapshot.version,
                    error = %err,
                    "snapshot unusable, replaying full stream"
                );
                let events = self.events.get_events(&stream_id, None).await?;
                reconstruct(&events)
            }
        }
    }

    /// Returns `true` if the aggregate's stream holds any events.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a nil id, or the event store's
    /// error.
    pub async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
        validate_id(id, "aggregate id")?;
        Ok(self.events.current_version(&id.to_string()).await? > 0)
    }

    /// Removes the aggregate's stream, then its snapshots. A snapshot fault
    /// is logged and never returned.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a nil id, or the event store's
    /// error.
    #[instrument(skip_all, fields(aggregate_type = %A::AGGREGATE_TYPE, aggregate_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        validate_id(id, "aggregate id")?;
        let stream_id = id.to_string();
        self.events.delete(&stream_id).await?;
        if let Some(manager) = &self.snapshots {
            if let Err(err) = manager.delete_snapshots(&stream_id).await {
                warn!(error = %err, "could not delete snapshots of removed stream");
            }
        }
        Ok(())
    }
}

fn restore_snapshot<A: Snapshottable>(snapshot: &Snapshot) -> Result<A, DomainError> {
    let state: A::State = serde_json::from_value(snapshot.data.clone()).map_err(|e| {
        DomainError::Reconstruction(format!(
            "snapshot of {} at version {} is malformed: {e}",
            snapshot.aggregate_id, snapshot.version
        ))
    })?;
    A::restore(state, snapshot.version)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dugout_core::event_store::AggregateType;
    use dugout_core::snapshot::SnapshotStore;
    use dugout_event_store::{InMemoryEventStore, InMemorySnapshotStore, SnapshotConfig};
    use dugout_test_support::{
        EmptyEventStore, FailingEventStore, FailingSnapshotStore, RecordingEventStore,
        init_tracing,
    };

    use super::*;
    use crate::test_aggregate::{TALLY_OPENED_EVENT_TYPE, Tally, fixed_clock};

    fn plain_repo(events: Arc<dyn EventStore>) -> EventSourcedRepository<Tally> {
        EventSourcedRepository::new(events, "repository-test")
    }

    fn snapshotting_repo(
        events: Arc<InMemoryEventStore>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> EventSourcedRepository<Tally> {
        let manager = SnapshotManager::new(snapshots, events.clone());
        EventSourcedRepository::new(events, "repository-test").with_snapshots(manager)
    }

    fn tally_with_increments(n: usize) -> Tally {
        let mut tally = Tally::open("runs", &fixed_clock());
        for i in 0..n {
            tally.increment(i64::try_from(i).unwrap() + 1, &fixed_clock());
        }
        tally
    }

    #[tokio::test]
    async fn test_save_appends_uncommitted_events_with_prior_version() {
        // Arrange
        let store = Arc::new(RecordingEventStore::new(vec![]));
        let repo = plain_repo(store.clone());
        let mut tally = tally_with_increments(2);
        assert_eq!(tally.version(), 3);

        // Act
        repo.save(&mut tally).await.unwrap();

        // Assert
        let appended = store.appended_events();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].stream_id, tally.aggregate_id().to_string());
        assert_eq!(appended[0].aggregate_type, AggregateType::Game);
        assert_eq!(appended[0].expected_version, 0);
        assert_eq!(appended[0].events.len(), 3);
        assert_eq!(appended[0].events[0].event_type, TALLY_OPENED_EVENT_TYPE);
        assert!(
            appended[0]
                .events
                .iter()
                .all(|e| e.source == "repository-test")
        );
        assert!(tally.uncommitted_events().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_find_by_id_round_trips() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let repo = plain_repo(store.clone());
        let mut tally = tally_with_increments(2);
        repo.save(&mut tally).await.unwrap();

        // Act
        let found = repo.find_by_id(tally.aggregate_id()).await.unwrap().unwrap();

        // Assert
        assert_eq!(found.snapshot_state(), tally.snapshot_state());
        assert_eq!(found.version(), 3);
        assert!(found.uncommitted_events().is_empty());
        let stored = store
            .get_events(&tally.aggregate_id().to_string(), None)
            .await
            .unwrap();
        let versions: Vec<i64> = stored.iter().map(|e| e.stream_version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_second_save_uses_committed_head_as_expected_version() {
        let store = Arc::new(InMemoryEventStore::new());
        let repo = plain_repo(store.clone());
        let mut tally = tally_with_increments(1);
        repo.save(&mut tally).await.unwrap();

        tally.increment(7, &fixed_clock());
        repo.save(&mut tally).await.unwrap();

        let found = repo.find_by_id(tally.aggregate_id()).await.unwrap().unwrap();
        assert_eq!(found.version(), 3);
        assert_eq!(found.total, 8);
    }

    #[tokio::test]
    async fn test_find_by_id_returns_none_for_unknown_id() {
        let repo = plain_repo(Arc::new(EmptyEventStore));

        let found = repo.find_by_id(Uuid::new_v4()).await.unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_nil_id_is_rejected_before_io() {
        let repo = plain_repo(Arc::new(FailingEventStore));

        assert!(matches!(
            repo.find_by_id(Uuid::nil()).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            repo.delete(Uuid::nil()).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            repo.exists(Uuid::nil()).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_uncommitted_events() {
        // Arrange
        let repo = plain_repo(Arc::new(FailingEventStore));
        let mut tally = tally_with_increments(1);
        let before: Vec<Uuid> = tally
            .uncommitted_events()
            .iter()
            .map(|e| e.metadata.event_id)
            .collect();

        // Act
        let result = repo.save(&mut tally).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        let after: Vec<Uuid> = tally
            .uncommitted_events()
            .iter()
            .map(|e| e.metadata.event_id)
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_racing_saves_exactly_one_wins() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let repo = plain_repo(store.clone());
        let id = Uuid::new_v4();
        let mut first = Tally::open_with_id(id, "home", &fixed_clock());
        let mut second = Tally::open_with_id(id, "away", &fixed_clock());

        // Act
        let (a, b) = tokio::join!(repo.save(&mut first), repo.save(&mut second));

        // Assert
        let (winner, loser) = if a.is_ok() {
            (first, second)
        } else {
            (second, first)
        };
        let failure = if a.is_ok() { b } else { a };
        assert!(matches!(
            failure,
            Err(DomainError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
        assert!(winner.uncommitted_events().is_empty());
        assert_eq!(loser.uncommitted_events().len(), 1);
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.label, winner.label);
    }

    #[tokio::test]
    async fn test_save_without_uncommitted_events_is_a_noop() {
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new(SnapshotConfig { frequency: 1 }));
        let repo = snapshotting_repo(store.clone(), snapshots.clone());
        let mut tally = tally_with_increments(0);
        repo.save(&mut tally).await.unwrap();
        let id = tally.aggregate_id().to_string();
        let snapshots_after_first_save = snapshots.snapshots_of(&id).len();

        repo.save(&mut tally).await.unwrap();

        assert_eq!(store.current_version(&id).await.unwrap(), 1);
        assert_eq!(snapshots.snapshots_of(&id).len(), snapshots_after_first_save);
    }

    #[tokio::test]
    async fn test_save_reaching_frequency_writes_snapshot_and_reads_suffix_only() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new(SnapshotConfig { frequency: 10 }));
        let repo = snapshotting_repo(store.clone(), snapshots.clone());
        let mut tally = tally_with_increments(9);
        assert_eq!(tally.version(), 10);

        // Act
        repo.save(&mut tally).await.unwrap();

        // Assert
        let id = tally.aggregate_id().to_string();
        let written = snapshots.snapshots_of(&id);
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].version, 10);

        tally.increment(100, &fixed_clock());
        repo.save(&mut tally).await.unwrap();
        let manager = SnapshotManager::new(snapshots.clone(), store.clone());
        let loaded = manager
            .load_aggregate(&id, AggregateType::Game)
            .await
            .unwrap();
        assert!(loaded.reconstructed_from_snapshot);
        assert_eq!(loaded.subsequent_events.len(), 1);
        assert_eq!(loaded.subsequent_events[0].stream_version, 11);

        let found = repo.find_by_id(tally.aggregate_id()).await.unwrap().unwrap();
        assert_eq!(found.version(), 11);
        assert_eq!(found.snapshot_state(), tally.snapshot_state());
    }

    #[tokio::test]
    async fn test_snapshot_plus_suffix_equals_full_replay() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new(SnapshotConfig { frequency: 4 }));
        let with_snapshots = snapshotting_repo(store.clone(), snapshots.clone());
        let full_replay = plain_repo(store.clone());
        let mut tally = tally_with_increments(4);
        with_snapshots.save(&mut tally).await.unwrap();
        tally.increment(10, &fixed_clock());
        tally.increment(20, &fixed_clock());
        with_snapshots.save(&mut tally).await.unwrap();

        // Act
        let from_snapshot = with_snapshots
            .find_by_id(tally.aggregate_id())
            .await
            .unwrap()
            .unwrap();
        let replayed = full_replay
            .find_by_id(tally.aggregate_id())
            .await
            .unwrap()
            .unwrap();

        // Assert
        assert_eq!(
            snapshots.snapshots_of(&tally.aggregate_id().to_string())[0].version,
            5
        );
        assert_eq!(from_snapshot.version(), replayed.version());
        assert_eq!(from_snapshot.snapshot_state(), replayed.snapshot_state());
    }

    #[tokio::test]
    async fn test_snapshot_with_empty_suffix_restores_directly() {
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new(SnapshotConfig { frequency: 3 }));
        let repo = snapshotting_repo(store.clone(), snapshots.clone());
        let mut tally = tally_with_increments(2);
        repo.save(&mut tally).await.unwrap();

        let found = repo.find_by_id(tally.aggregate_id()).await.unwrap().unwrap();

        assert_eq!(found.version(), 3);
        assert_eq!(found.total, 3);
        assert_eq!(found.label, "runs");
    }

    #[tokio::test]
    async fn test_malformed_snapshot_falls_back_to_full_replay() {
        init_tracing();
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new(SnapshotConfig { frequency: 50 }));
        let repo = snapshotting_repo(store.clone(), snapshots.clone());
        let mut tally = tally_with_increments(2);
        repo.save(&mut tally).await.unwrap();
        snapshots
            .save(
                &tally.aggregate_id().to_string(),
                AggregateType::Game,
                2,
                serde_json::json!({"unexpected": true}),
            )
            .await
            .unwrap();

        // Act
        let found = repo.find_by_id(tally.aggregate_id()).await.unwrap().unwrap();

        // Assert
        assert_eq!(found.snapshot_state(), tally.snapshot_state());
        assert_eq!(found.version(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_failure_does_not_fail_save() {
        init_tracing();
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let repo = snapshotting_repo(store.clone(), Arc::new(FailingSnapshotStore { frequency: 1 }));
        let mut tally = tally_with_increments(3);

        // Act
        let result = repo.save(&mut tally).await;

        // Assert
        assert!(result.is_ok());
        assert!(tally.uncommitted_events().is_empty());
        let found = repo.find_by_id(tally.aggregate_id()).await.unwrap().unwrap();
        assert_eq!(found.version(), 4);
    }

    #[tokio::test]
    async fn test_find_by_id_propagates_reconstruction_error() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let id = Uuid::new_v4();
        let tally = Tally::open_with_id(id, "runs", &fixed_clock());
        let mut bogus = NewEvent::from_domain_event(&tally.uncommitted_events()[0], "test").unwrap();
        bogus.event_data = "{not json".to_owned();
        store
            .append(&id.to_string(), AggregateType::Game, &[bogus], 0)
            .await
            .unwrap();
        let repo = plain_repo(store);

        // Act
        let result = repo.find_by_id(id).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Reconstruction(_))));
    }

    #[tokio::test]
    async fn test_loaded_aggregate_saves_against_stored_head() {
        // Arrange
        let tally = tally_with_increments(2);
        let stream_id = tally.aggregate_id().to_string();
        let stored: Vec<StoredEvent> = tally
            .uncommitted_events()
            .iter()
            .zip(1..)
            .map(|(event, version)| {
                NewEvent::from_domain_event(event, "seed")
                    .unwrap()
                    .into_stored(&stream_id, AggregateType::Game, version, fixed_clock().0)
            })
            .collect();
        let store = Arc::new(RecordingEventStore::new(stored));
        let repo = plain_repo(store.clone());

        // Act
        let mut loaded = repo.find_by_id(tally.aggregate_id()).await.unwrap().unwrap();
        loaded.increment(10, &fixed_clock());
        repo.save(&mut loaded).await.unwrap();

        // Assert
        assert!(repo.exists(tally.aggregate_id()).await.unwrap());
        assert_eq!(loaded.total, tally.total + 10);
        let appended = store.appended_events();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].expected_version, 3);
        assert_eq!(appended[0].events.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_id_propagates_store_error() {
        let repo = plain_repo(Arc::new(FailingEventStore));

        let result = repo.find_by_id(Uuid::new_v4()).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_stream_and_snapshots() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new(SnapshotConfig { frequency: 2 }));
        let repo = snapshotting_repo(store.clone(), snapshots.clone());
        let mut tally = tally_with_increments(1);
        repo.save(&mut tally).await.unwrap();
        let id = tally.aggregate_id();
        assert!(repo.exists(id).await.unwrap());

        // Act
        repo.delete(id).await.unwrap();

        // Assert
        assert!(!repo.exists(id).await.unwrap());
        assert!(repo.find_by_id(id).await.unwrap().is_none());
        assert!(snapshots.snapshots_of(&id.to_string()).is_empty());
    }

    #[tokio::test]
    async fn test_delete_tolerates_snapshot_store_failure() {
        init_tracing();
        let store = Arc::new(RecordingEventStore::new(vec![]));
        let manager = SnapshotManager::new(Arc::new(FailingSnapshotStore { frequency: 1 }), store.clone());
        let repo = EventSourcedRepository::<Tally>::new(store.clone(), "repository-test")
            .with_snapshots(manager);
        let id = Uuid::new_v4();

        repo.delete(id).await.unwrap();

        assert_eq!(store.deleted_streams(), vec![id.to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_outliving_its_stream_is_not_applied_to_a_rewritten_stream() {
        init_tracing();
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new(SnapshotConfig { frequency: 2 }));
        let repo = snapshotting_repo(store.clone(), snapshots.clone());
        let id = Uuid::new_v4();
        let mut old = Tally::open_with_id(id, "runs", &fixed_clock());
        old.increment(100, &fixed_clock());
        old.increment(100, &fixed_clock());
        repo.save(&mut old).await.unwrap();
        assert_eq!(snapshots.snapshots_of(&id.to_string())[0].version, 3);
        // The stream goes away but its snapshot stays behind.
        store.delete(&id.to_string()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut rewritten = Tally::open_with_id(id, "hits", &fixed_clock());
        for _ in 0..3 {
            rewritten.increment(1, &fixed_clock());
        }
        repo.save(&mut rewritten).await.unwrap();

        // Act
        let found = repo.find_by_id(id).await.unwrap().unwrap();

        // Assert
        assert_eq!(found.label, "hits");
        assert_eq!(found.total, 3);
        assert_eq!(found.version(), 4);
    }

    #[tokio::test]
    async fn test_reconstruct_streams_groups_by_stream_and_tracks_last_seen() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let repo = plain_repo(store.clone());
        let mut a = tally_with_increments(0);
        let mut b = tally_with_increments(0);
        repo.save(&mut a).await.unwrap();
        repo.save(&mut b).await.unwrap();
        a.increment(2, &fixed_clock());
        repo.save(&mut a).await.unwrap();

        // Act
        let all = store.get_all_events().await.unwrap();
        let replayed = reconstruct_streams::<Tally>(&all).unwrap();

        // Assert
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].aggregate.aggregate_id(), a.aggregate_id());
        assert_eq!(replayed[0].last_seen, 2);
        assert_eq!(replayed[0].aggregate.total, 2);
        assert_eq!(replayed[1].aggregate.aggregate_id(), b.aggregate_id());
        assert_eq!(replayed[1].last_seen, 1);
    }
}
