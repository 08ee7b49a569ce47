//! Persistence contract for games and its event-sourced implementation.

use std::sync::Arc;

use async_trait::async_trait;
use dugout_core::error::DomainError;
use dugout_core::event_store::{AggregateType, EventStore};
use dugout_repository::{EventSourcedRepository, SnapshotManager, reconstruct_streams};
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::{Game, GameStatus};

/// Provenance recorded on every event this repository appends.
pub const GAME_EVENT_SOURCE: &str = "dugout-game";

/// Persistence operations for [`Game`] aggregates.
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Appends the game's uncommitted events.
    async fn save(&self, game: &mut Game) -> Result<(), DomainError>;

    /// Rebuilds a game, or `None` if it was never saved.
    async fn find_by_id(&self, game_id: Uuid) -> Result<Option<Game>, DomainError>;

    /// Every game currently in `status`, in order of creation.
    async fn find_by_status(&self, status: GameStatus) -> Result<Vec<Game>, DomainError>;

    /// Returns `true` if the game has been saved.
    async fn exists(&self, game_id: Uuid) -> Result<bool, DomainError>;

    /// Removes the game's stream and snapshots.
    async fn delete(&self, game_id: Uuid) -> Result<(), DomainError>;
}

/// [`GameRepository`] backed by an [`EventStore`].
#[derive(Debug, Clone)]
pub struct EventSourcedGameRepository {
    inner: EventSourcedRepository<Game>,
}

impl EventSourcedGameRepository {
    /// Creates a repository that replays full streams.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self {
            inner: EventSourcedRepository::new(events, GAME_EVENT_SOURCE),
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
impl GameRepository for EventSourcedGameRepository {
    async fn save(&self, game: &mut Game) -> Result<(), DomainError> {
        self.inner.save(game).await
    }

    async fn find_by_id(&self, game_id: Uuid) -> Result<Option<Game>, DomainError> {
        self.inner.find_by_id(game_id).await
    }

    async fn find_by_status(&self, status: GameStatus) -> Result<Vec<Game>, DomainError> {
        // Full scan of Game streams; replace with a status index if it grows.
        let events = self
            .inner
            .event_store()
            .get_events_by_type(AggregateType::Game)
            .await?;
        let games: Vec<Game> = reconstruct_streams::<Game>(&events)?
            .into_iter()
            .map(|replayed| replayed.aggregate)
            .filter(|game| game.status() == status)
            .collect();
        debug!(?status, matched = games.len(), "scanned games by status");
        Ok(games)
    }

    async fn exists(&self, game_id: Uuid) -> Result<bool, DomainError> {
        self.inner.exists(game_id).await
    }

    async fn delete(&self, game_id: Uuid) -> Result<(), DomainError> {
        self.inner.delete(game_id).await
    }
}
