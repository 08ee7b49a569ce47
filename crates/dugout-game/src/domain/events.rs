//! Domain events for the Game context.

use dugout_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which team a side of the scoreboard belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamSide {
    /// The home team, batting in the bottom half.
    Home,
    /// The visiting team, batting in the top half.
    Away,
}

/// Emitted when a game is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCreated {
    /// The game identifier.
    pub game_id: Uuid,
    /// Home team name.
    pub home_team: String,
    /// Away team name.
    pub away_team: String,
}

/// Emitted when the first pitch is thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStarted {
    /// The game identifier.
    pub game_id: Uuid,
}

/// Emitted when a team scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunsScored {
    /// The game identifier.
    pub game_id: Uuid,
    /// The scoring side.
    pub side: TeamSide,
    /// Runs scored on the play.
    pub runs: u32,
}

/// Emitted when the game ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCompleted {
    /// The game identifier.
    pub game_id: Uuid,
}

/// Event type identifier for [`GameCreated`].
pub const GAME_CREATED_EVENT_TYPE: &str = "game.created";

/// Event type identifier for [`GameStarted`].
pub const GAME_STARTED_EVENT_TYPE: &str = "game.started";

/// Event type identifier for [`RunsScored`].
pub const RUNS_SCORED_EVENT_TYPE: &str = "game.runs_scored";

/// Event type identifier for [`GameCompleted`].
pub const GAME_COMPLETED_EVENT_TYPE: &str = "game.completed";

/// Event payload variants for the Game context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventKind {
    /// A game has been created.
    GameCreated(GameCreated),
    /// A game has started.
    GameStarted(GameStarted),
    /// Runs have been scored.
    RunsScored(RunsScored),
    /// A game has been completed.
    GameCompleted(GameCompleted),
}

impl GameEventKind {
    /// Event type identifier of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GameCreated(_) => GAME_CREATED_EVENT_TYPE,
            Self::GameStarted(_) => GAME_STARTED_EVENT_TYPE,
            Self::RunsScored(_) => RUNS_SCORED_EVENT_TYPE,
            Self::GameCompleted(_) => GAME_COMPLETED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Game context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: GameEventKind,
}

impl DomainEvent for GameEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn game_id(&self) -> Option<Uuid> {
        Some(self.metadata.aggregate_id)
    }
}
