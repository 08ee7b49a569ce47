//! Persistence contract for team lineups and its event-sourced
//! implementation.

use std::sync::Arc;

use async_trait::async_trait;
use dugout_core::error::DomainError;
use dugout_core::event_store::{AggregateType, EventStore, validate_id};
use dugout_game::domain::events::TeamSide;
use dugout_repository::{EventSourcedRepository, ReplayedStream, SnapshotManager, reconstruct_streams};
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::TeamLineup;

/// Provenance recorded on every event this repository appends.
pub const LINEUP_EVENT_SOURCE: &str = "dugout-lineup";

/// Persistence operations for [`TeamLineup`] aggregates.
#[async_trait]
pub trait TeamLineupRepository: Send + Sync {
    /// Appends the lineup's uncommitted events.
    async fn save(&self, lineup: &mut TeamLineup) -> Result<(), DomainError>;

    /// Rebuilds a lineup, or `None` if it was never saved.
    async fn find_by_id(&self, lineup_id: Uuid) -> Result<Option<TeamLineup>, DomainError>;

    /// Every lineup of a game, in order of creation.
    async fn find_by_game_id(&self, game_id: Uuid) -> Result<Vec<TeamLineup>, DomainError>;

    /// The lineup one side of a game is using. If several exist, the most
    /// recently changed one wins.
    async fn find_by_game_and_side(
        &self,
        game_id: Uuid,
        side: TeamSide,
    ) -> Result<Option<TeamLineup>, DomainError>;

    /// Returns `true` if the lineup has been saved.
    async fn exists(&self, lineup_id: Uuid) -> Result<bool, DomainError>;

    /// Removes the lineup's stream and snapshots.
    async fn delete(&self, lineup_id: Uuid) -> Result<(), DomainError>;
}

/// [`TeamLineupRepository`] backed by an [`EventStore`].
#[derive(Debug, Clone)]
pub struct EventSourcedTeamLineupRepository {
    inner: EventSourcedRepository<TeamLineup>,
}

impl EventSourcedTeamLineupRepository {
    /// Creates a repository that replays full streams.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self {
            inner: EventSourcedRepository::new(events, LINEUP_EVENT_SOURCE),
        }
    }

    /// Reads and writes snapshots through `manager`.
    #[must_use]
    pub fn with_snapshots(self, manager: SnapshotManager) -> Self {
        Self {
            inner: self.inner.with_snapshots(manager),
        }
    }

    async fn lineups_of_game(
        &self,
        game_id: Uuid,
    ) -> Result<Vec<ReplayedStream<TeamLineup>>, DomainError> {
        validate_id(game_id, "game id")?;
        let events = self
            .inner
            .event_store()
            .get_events_by_game_id(game_id, Some(&[AggregateType::TeamLineup]))
            .await?;
        let lineups: Vec<_> = reconstruct_streams::<TeamLineup>(&events)?
            .into_iter()
            .filter(|replayed| replayed.aggregate.game_id() == game_id)
            .collect();
        debug!(%game_id, lineups = lineups.len(), "scanned lineups of game");
        Ok(lineups)
    }
}

#[async_trait]
impl TeamLineupRepository for EventSourcedTeamLineupRepository {
    async fn save(&self, lineup: &mut TeamLineup) -> Result<(), DomainError> {
        self.inner.save(lineup).await
    }

    async fn find_by_id(&self, lineup_id: Uuid) -> Result<Option<TeamLineup>, DomainError> {
        self.inner.find_by_id(lineup_id).await
    }

    async fn find_by_game_id(&self, game_id: Uuid) -> Result<Vec<TeamLineup>, DomainError> {
        Ok(self
            .lineups_of_game(game_id)
            .await?
            .into_iter()
            .map(|replayed| replayed.aggregate)
            .collect())
    }

    async fn find_by_game_and_side(
        &self,
        game_id: Uuid,
        side: TeamSide,
    ) -> Result<Option<TeamLineup>, DomainError> {
        Ok(self
            .lineups_of_game(game_id)
            .await?
            .into_iter()
            .filter(|replayed| replayed.aggregate.side() == side)
            .max_by_key(|replayed| replayed.last_seen)
            .map(|replayed| replayed.aggregate))
    }

    async fn exists(&self, lineup_id: Uuid) -> Result<bool, DomainError> {
        self.inner.exists(lineup_id).await
    }

    async fn delete(&self, lineup_id: Uuid) -> Result<(), DomainError> {
        self.inner.delete(lineup_id).await
    }
}
