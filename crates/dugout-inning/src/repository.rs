//! Persistence contract for inning state and its event-sourced
//! implementation.

use std::sync::Arc;

use async_trait::async_trait;
use dugout_core::error::DomainError;
use dugout_core::event_store::{EventStore, validate_id};
use dugout_repository::{EventSourcedRepository, SnapshotManager, reconstruct_streams};
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::InningState;

/// Provenance recorded on every event this repository appends.
pub const INNING_EVENT_SOURCE: &str = "dugout-inning";

/// Persistence operations for [`InningState`] aggregates.
#[async_trait]
pub trait InningStateRepository: Send + Sync {
    /// Appends the inning state's uncommitted events.
    async fn save(&self, state: &mut InningState) -> Result<(), DomainError>;

    /// Rebuilds an inning state, or `None` if it was never saved.
    async fn find_by_id(&self, inning_state_id: Uuid) -> Result<Option<InningState>, DomainError>;

    /// The inning state of `game_id` whose stream was written to most
    /// recently, or `None` if the game has none.
    async fn find_current_by_game_id(
        &self,
        game_id: Uuid,
    ) -> Result<Option<InningState>, DomainError>;

    /// Returns `true` if the inning state has been saved.
    async fn exists(&self, inning_state_id: Uuid) -> Result<bool, DomainError>;

    /// Removes the inning state's stream and snapshots.
    async fn delete(&self, inning_state_id: Uuid) -> Result<(), DomainError>;
}

/// [`InningStateRepository`] backed by an [`EventStore`].
#[derive(Debug, Clone)]
pub struct EventSourcedInningStateRepository {
    inner: EventSourcedRepository<InningState>,
}

impl EventSourcedInningStateRepository {
    /// Creates a repository that replays full streams.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self {
            inner: EventSourcedRepository::new(events, INNING_EVENT_SOURCE),
        }
    }

    /// Reads and writes snapshots through `manager`.
    #[must_use]
    pub fn with_snapshots(self, manager: SnapshotManager) -> Self {
        Self {
            inner: self.inner.with_snapshots(manager),
        }
    }
}

#[async_trait]
impl InningStateRepository for EventSourcedInningStateRepository {
    async fn save(&self, state: &mut InningState) -> Result<(), DomainError> {
        self.inner.save(state).await
    }

    async fn find_by_id(&self, inning_state_id: Uuid) -> Result<Option<InningState>, DomainError> {
        self.inner.find_by_id(inning_state_id).await
    }

    async fn find_current_by_game_id(
        &self,
        game_id: Uuid,
    ) -> Result<Option<InningState>, DomainError> {
        validate_id(game_id, "game id")?;
        // Unindexed: scans every stream in the store. Callers only see this
        // method, so a game_id index can replace the scan later.
        let events = self.inner.event_store().get_all_events().await?;
        let current = reconstruct_streams::<InningState>(&events)?
            .into_iter()
            .filter(|replayed| replayed.aggregate.game_id() == game_id)
            .max_by_key(|replayed| replayed.last_seen)
            .map(|replayed| replayed.aggregate);
        debug!(
            %game_id,
            scanned = events.len(),
            found = current.is_some(),
            "resolved current inning state"
        );
        Ok(current)
    }

    async fn exists(&self, inning_state_id: Uuid) -> Result<bool, DomainError> {
        self.inner.exists(inning_state_id).await
    }

    async fn delete(&self, inning_state_id: Uuid) -> Result<(), DomainError> {
        self.inner.delete(inning_state_id).await
    }
}
