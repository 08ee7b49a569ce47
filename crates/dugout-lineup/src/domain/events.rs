//! Domain events for the Team lineup context.

use dugout_core::event::{DomainEvent, EventMetadata};
use dugout_game::domain::events::TeamSide;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defensive positions, numbered as on a scorecard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldPosition {
    /// 1
    Pitcher,
    /// 2
    Catcher,
    /// 3
    FirstBase,
    /// 4
    SecondBase,
    /// 5
    ThirdBase,
    /// 6
    Shortstop,
    /// 7
    LeftField,
    /// 8
    CenterField,
    /// 9
    RightField,
    /// Bats but does not field.
    DesignatedHitter,
}

/// Emitted when a team's lineup card is opened for a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupCreated {
    /// The lineup identifier.
    pub lineup_id: Uuid,
    /// The game this lineup plays in.
    pub game_id: Uuid,
    /// Team name.
    pub team_name: String,
    /// Home or away.
    pub side: TeamSide,
}

/// Emitted when a player is written into an empty batting slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAdded {
    /// Batting order slot, 1 through 9.
    pub batting_order: u8,
    /// Player name.
    pub player: String,
    /// Defensive position.
    pub position: FieldPosition,
}

/// Emitted when a player replaces the occupant of a batting slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSubstituted {
    /// Batting order slot, 1 through 9.
    pub batting_order: u8,
    /// Player leaving the game.
    pub outgoing: String,
    /// Player entering the game.
    pub incoming: String,
    /// Defensive position of the incoming player.
    pub position: FieldPosition,
}

/// Emitted when a player moves to another defensive position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChanged {
    /// Batting order slot, 1 through 9.
    pub batting_order: u8,
    /// The new position.
    pub position: FieldPosition,
}

/// Event type identifier for [`LineupCreated`].
pub const LINEUP_CREATED_EVENT_TYPE: &str = "lineup.created";

/// Event type identifier for [`PlayerAdded`].
pub const PLAYER_ADDED_EVENT_TYPE: &str = "lineup.player_added";

/// Event type identifier for [`PlayerSubstituted`].
pub const PLAYER_SUBSTITUTED_EVENT_TYPE: &str = "lineup.player_substituted";

/// Event type identifier for [`PositionChanged`].
pub const POSITION_CHANGED_EVENT_TYPE: &str = "lineup.position_changed";

/// Event payload variants for the Team lineup context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineupEventKind {
    /// A lineup has been created.
    LineupCreated(LineupCreated),
    /// A player has been added.
    PlayerAdded(PlayerAdded),
    /// A player has been substituted.
    PlayerSubstituted(PlayerSubstituted),
    /// A player has changed position.
    PositionChanged(PositionChanged),
}

impl LineupEventKind {
    /// Event type identifier of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LineupCreated(_) => LINEUP_CREATED_EVENT_TYPE,
            Self::PlayerAdded(_) => PLAYER_ADDED_EVENT_TYPE,
            Self::PlayerSubstituted(_) => PLAYER_SUBSTITUTED_EVENT_TYPE,
            Self::PositionChanged(_) => POSITION_CHANGED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Team lineup context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The game the lineup belongs to, carried on every event so game-wide
    /// queries can find it.
    pub game_id: Uuid,
    /// Event-specific payload.
    pub kind: LineupEventKind,
}

impl DomainEvent for LineupEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn game_id(&self) -> Option<Uuid> {
        Some(self.game_id)
    }
}
