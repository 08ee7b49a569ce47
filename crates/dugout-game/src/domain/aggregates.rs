//! Aggregate roots for the Game context.

use dugout_core::aggregate::{AggregateRoot, Snapshottable};
use dugout_core::clock::Clock;
use dugout_core::error::DomainError;
use dugout_core::event::{DomainEvent, EventMetadata};
use dugout_core::event_store::AggregateType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    GameCompleted, GameCreated, GameEvent, GameEventKind, GameStarted, RunsScored, TeamSide,
};

/// Lifecycle of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// Created, first pitch not yet thrown.
    NotStarted,
    /// Being played.
    InProgress,
    /// Final.
    Completed,
}

/// Snapshot projection of a [`Game`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// The game identifier.
    pub id: Uuid,
    /// Home team name.
    pub home_team: String,
    /// Away team name.
    pub away_team: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Home runs.
    pub home_score: u32,
    /// Away runs.
    pub away_score: u32,
}

/// The aggregate root for a game.
#[derive(Debug)]
pub struct Game {
    id: Uuid,
    version: i64,
    home_team: String,
    away_team: String,
    status: GameStatus,
    home_score: u32,
    away_score: u32,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<GameEvent>,
}

impl Game {
    fn blank(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            home_team: String::new(),
            away_team: String::new(),
            status: GameStatus::NotStarted,
            home_score: 0,
            away_score: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Creates a new game between two teams, producing a `GameCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the id is nil, a team name is
    /// blank, or both names are the same.
    pub fn create(
        game_id: Uuid,
        home_team: &str,
        away_team: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        if game_id.is_nil() {
            return Err(DomainError::Validation("game id must not be nil".into()));
        }
        let (home_team, away_team) = (home_team.trim(), away_team.trim());
        if home_team.is_empty() || away_team.is_empty() {
            return Err(DomainError::Validation(
                "team names must not be blank".into(),
            ));
        }
        if home_team == away_team {
            return Err(DomainError::Validation(format!(
                "a team cannot play itself: {home_team}"
            )));
        }

        let mut game = Self::blank(game_id);
        game.record(
            GameEventKind::GameCreated(GameCreated {
                game_id,
                home_team: home_team.to_owned(),
                away_team: away_team.to_owned(),
            }),
            correlation_id,
            clock,
        )?;
        Ok(game)
    }

    /// Starts the game, producing a `GameStarted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` unless the game has not started.
    pub fn start(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.require_status(GameStatus::NotStarted, "start")?;
        self.record(
            GameEventKind::GameStarted(GameStarted { game_id: self.id }),
            correlation_id,
            clock,
        )
    }

    /// Adds runs for one side, producing a `RunsScored` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the game is not in progress,
    /// `runs` is zero, or the side's score would overflow.
    pub fn score_runs(
        &mut self,
        side: TeamSide,
        runs: u32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.require_status(GameStatus::InProgress, "score")?;
        if runs == 0 {
            return Err(DomainError::Validation(
                "a scoring play needs at least one run".into(),
            ));
        }
        if self.score(side).checked_add(runs).is_none() {
            return Err(DomainError::Validation(format!(
                "{runs} more runs overflow the score"
            )));
        }
        self.record(
            GameEventKind::RunsScored(RunsScored {
                game_id: self.id,
                side,
                runs,
            }),
            correlation_id,
            clock,
        )
    }

    /// Ends the game, producing a `GameCompleted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` unless the game is in progress.
    pub fn complete(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.require_status(GameStatus::InProgress, "complete")?;
        self.record(
            GameEventKind::GameCompleted(GameCompleted { game_id: self.id }),
            correlation_id,
            clock,
        )
    }

    /// Home team name.
    #[must_use]
    pub fn home_team(&self) -> &str {
        &self.home_team
    }

    /// Away team name.
    #[must_use]
    pub fn away_team(&self) -> &str {
        &self.away_team
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Runs scored by `side`.
    #[must_use]
    pub fn score(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::Home => self.home_score,
            TeamSide::Away => self.away_score,
        }
    }

    fn require_status(&self, expected: GameStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::Validation(format!(
                "cannot {action} game {} while {:?}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn record(
        &mut self,
        kind: GameEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let event = GameEvent {
            metadata: EventMetadata::new(
                kind.event_type(),
                self.id,
                self.version + 1,
                correlation_id,
                clock,
            ),
            kind,
        };
        self.apply(&event)?;
        self.uncommitted_events.push(event);
        Ok(())
    }
}

impl AggregateRoot for Game {
    type Event = GameEvent;

    const AGGREGATE_TYPE: AggregateType = AggregateType::Game;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) -> Result<(), DomainError> {
        match (&event.kind, self.version) {
            (GameEventKind::GameCreated(payload), 0) => {
                self.id = payload.game_id;
                self.home_team.clone_from(&payload.home_team);
                self.away_team.clone_from(&payload.away_team);
                self.status = GameStatus::NotStarted;
            }
            (GameEventKind::GameCreated(_), _) | (_, 0) => {
                return Err(DomainError::Reconstruction(format!(
                    "{} cannot follow version {} of game {}",
                    event.event_type(),
                    self.version,
                    self.id
                )));
            }
            (GameEventKind::GameStarted(_), _) => self.status = GameStatus::InProgress,
            (GameEventKind::RunsScored(payload), _) => {
                let score = match payload.side {
                    TeamSide::Home => &mut self.home_score,
                    TeamSide::Away => &mut self.away_score,
                };
                *score = score.checked_add(payload.runs).ok_or_else(|| {
                    DomainError::Reconstruction(format!(
                        "score of game {} overflows at version {}",
                        self.id,
                        self.version + 1
                    ))
                })?;
            }
            (GameEventKind::GameCompleted(_), _) => self.status = GameStatus::Completed,
        }
        self.version += 1;
        Ok(())
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn mark_events_as_committed(&mut self) {
        self.uncommitted_events.clear();
    }

    fn from_events(events: &[Self::Event]) -> Result<Self, DomainError> {
        let first = events
            .first()
            .ok_or_else(|| DomainError::Reconstruction("game stream is empty".into()))?;
        let mut game = Self::blank(first.metadata.aggregate_id);
        for event in events {
            game.apply(event)?;
        }
        Ok(game)
    }
}

impl Snapshottable for Game {
    type State = GameState;

    fn snapshot_state(&self) -> GameState {
        GameState {
            id: self.id,
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
            status: self.status,
            home_score: self.home_score,
            away_score: self.away_score,
        }
    }

    fn restore(state: GameState, version: i64) -> Result<Self, DomainError> {
        if version < 1 || state.id.is_nil() {
            return Err(DomainError::Reconstruction(format!(
                "invalid game snapshot for {} at version {version}",
                state.id
            )));
        }
        Ok(Self {
            id: state.id,
            version,
            home_team: state.home_team,
            away_team: state.away_team,
            status: state.status,
            home_score: state.home_score,
            away_score: state.away_score,
            uncommitted_events: Vec::new(),
        })
    }
}
