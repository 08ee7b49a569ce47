//! Aggregate roots for the Team lineup context.

use dugout_core::aggregate::{AggregateRoot, Snapshottable};
use dugout_core::clock::Clock;
use dugout_core::error::DomainError;
use dugout_core::event::{DomainEvent, EventMetadata};
use dugout_core::event_store::AggregateType;
use dugout_game::domain::events::TeamSide;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    FieldPosition, LineupCreated, LineupEvent, LineupEventKind, PlayerAdded, PlayerSubstituted,
    PositionChanged,
};

/// Number of slots in a batting order.
pub const BATTING_ORDER_LEN: u8 = 9;

/// One occupied slot in the batting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattingSlot {
    /// Slot number, 1 through 9.
    pub batting_order: u8,
    /// Current occupant.
    pub player: String,
    /// Current defensive position.
    pub position: FieldPosition,
}

/// Snapshot projection of a [`TeamLineup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLineupState {
    /// The lineup identifier.
    pub id: Uuid,
    /// The game the lineup plays in.
    pub game_id: Uuid,
    /// Team name.
    pub team_name: String,
    /// Home or away.
    pub side: TeamSide,
    /// Occupied slots, in batting order.
    pub slots: Vec<BattingSlot>,
    /// Players who have left the game.
    pub removed_players: Vec<String>,
}

/// The aggregate root for one team's lineup in one game.
#[derive(Debug)]
pub struct TeamLineup {
    id: Uuid,
    version: i64,
    game_id: Uuid,
    team_name: String,
    side: TeamSide,
    /// Kept sorted by `batting_order`.
    slots: Vec<BattingSlot>,
    /// Substituted players may not re-enter.
    removed_players: Vec<String>,
    uncommitted_events: Vec<LineupEvent>,
}

impl TeamLineup {
    fn blank(id: Uuid, game_id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            game_id,
            team_name: String::new(),
            side: TeamSide::Home,
            slots: Vec::new(),
            removed_players: Vec::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Opens a lineup card, producing a `LineupCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if an id is nil or the team name is
    /// blank.
    pub fn create(
        lineup_id: Uuid,
        game_id: Uuid,
        team_name: &str,
        side: TeamSide,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        if lineup_id.is_nil() || game_id.is_nil() {
            return Err(DomainError::Validation(
                "lineup and game ids must not be nil".into(),
            ));
        }
        let team_name = team_name.trim();
        if team_name.is_empty() {
            return Err(DomainError::Validation("team name must not be blank".into()));
        }

        let mut lineup = Self::blank(lineup_id, game_id);
        lineup.record(
            LineupEventKind::LineupCreated(LineupCreated {
                lineup_id,
                game_id,
                team_name: team_name.to_owned(),
                side,
            }),
            correlation_id,
            clock,
        )?;
        Ok(lineup)
    }

    /// Writes a player into an empty batting slot, producing a
    /// `PlayerAdded` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the slot is out of range or
    /// taken, or the player is already listed or was substituted out.
    pub fn add_player(
        &mut self,
        batting_order: u8,
        player: &str,
        position: FieldPosition,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        validate_batting_order(batting_order)?;
        if self.slot(batting_order).is_some() {
            return Err(DomainError::Validation(format!(
                "batting slot {batting_order} is already filled"
            )));
        }
        let player = self.eligible_player(player)?;
        self.record(
            LineupEventKind::PlayerAdded(PlayerAdded {
                batting_order,
                player,
                position,
            }),
            correlation_id,
            clock,
        )
    }

    /// Replaces the occupant of a batting slot, producing a
    /// `PlayerSubstituted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the slot is empty, or the
    /// incoming player is already listed or was substituted out.
    pub fn substitute(
        &mut self,
        batting_order: u8,
        incoming: &str,
        position: FieldPosition,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let outgoing = self.occupied_slot(batting_order)?.player.clone();
        let incoming = self.eligible_player(incoming)?;
        self.record(
            LineupEventKind::PlayerSubstituted(PlayerSubstituted {
                batting_order,
                outgoing,
                incoming,
                position,
            }),
            correlation_id,
            clock,
        )
    }

    /// Moves a slot's occupant to another position, producing a
    /// `PositionChanged` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the slot is empty or the player
    /// already plays `position`.
    pub fn change_position(
        &mut self,
        batting_order: u8,
        position: FieldPosition,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.occupied_slot(batting_order)?.position == position {
            return Err(DomainError::Validation(format!(
                "slot {batting_order} already plays {position:?}"
            )));
        }
        self.record(
            LineupEventKind::PositionChanged(PositionChanged {
                batting_order,
                position,
            }),
            correlation_id,
            clock,
        )
    }

    /// The game this lineup plays in.
    #[must_use]
    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    /// Team name.
    #[must_use]
    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    /// Home or away.
    #[must_use]
    pub fn side(&self) -> TeamSide {
        self.side
    }

    /// Occupied slots in batting order.
    #[must_use]
    pub fn slots(&self) -> &[BattingSlot] {
        &self.slots
    }

    /// The slot at `batting_order`, if filled.
    #[must_use]
    pub fn slot(&self, batting_order: u8) -> Option<&BattingSlot> {
        self.slots
            .iter()
            .find(|slot| slot.batting_order == batting_order)
    }

    /// Returns `true` once all nine slots are filled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.len() == usize::from(BATTING_ORDER_LEN)
    }

    fn occupied_slot(&self, batting_order: u8) -> Result<&BattingSlot, DomainError> {
        validate_batting_order(batting_order)?;
        self.slot(batting_order).ok_or_else(|| {
            DomainError::Validation(format!("batting slot {batting_order} is empty"))
        })
    }

    fn eligible_player(&self, player: &str) -> Result<String, DomainError> {
        let player = player.trim();
        if player.is_empty() {
            return Err(DomainError::Validation("player name must not be blank".into()));
        }
        if self.slots.iter().any(|slot| slot.player == player) {
            return Err(DomainError::Validation(format!(
                "{player} is already in the lineup"
            )));
        }
        if self.removed_players.iter().any(|removed| removed == player) {
            return Err(DomainError::Validation(format!(
                "{player} was substituted out and cannot re-enter"
            )));
        }
        Ok(player.to_owned())
    }

    fn record(
        &mut self,
        kind: LineupEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let event = LineupEvent {
            metadata: EventMetadata::new(
                kind.event_type(),
                self.id,
                self.version + 1,
                correlation_id,
                clock,
            ),
            game_id: self.game_id,
            kind,
        };
        self.apply(&event)?;
        self.uncommitted_events.push(event);
        Ok(())
    }

    fn slot_mut(
        &mut self,
        batting_order: u8,
        event: &LineupEvent,
    ) -> Result<&mut BattingSlot, DomainError> {
        let version = self.version;
        self.slots
            .iter_mut()
            .find(|slot| slot.batting_order == batting_order)
            .ok_or_else(|| {
                DomainError::Reconstruction(format!(
                    "{} at version {} targets empty slot {batting_order}",
                    event.event_type(),
                    version + 1
                ))
            })
    }
}

fn validate_batting_order(batting_order: u8) -> Result<(), DomainError> {
    if !(1..=BATTING_ORDER_LEN).contains(&batting_order) {
        return Err(DomainError::Validation(format!(
            "batting order must be 1 through {BATTING_ORDER_LEN}, got {batting_order}"
        )));
    }
    Ok(())
}

impl AggregateRoot for TeamLineup {
    type Event = LineupEvent;

    const AGGREGATE_TYPE: AggregateType = AggregateType::TeamLineup;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) -> Result<(), DomainError> {
        match (&event.kind, self.version) {
            (LineupEventKind::LineupCreated(payload), 0) => {
                self.id = payload.lineup_id;
                self.game_id = payload.game_id;
                self.team_name.clone_from(&payload.team_name);
                self.side = payload.side;
            }
            (LineupEventKind::LineupCreated(_), _) | (_, 0) => {
                return Err(DomainError::Reconstruction(format!(
                    "{} cannot follow version {} of lineup {}",
                    event.event_type(),
                    self.version,
                    self.id
                )));
            }
            (LineupEventKind::PlayerAdded(payload), _) => {
                self.slots.push(BattingSlot {
                    batting_order: payload.batting_order,
                    player: payload.player.clone(),
                    position: payload.position,
                });
                self.slots.sort_by_key(|slot| slot.batting_order);
            }
            (LineupEventKind::PlayerSubstituted(payload), _) => {
                let slot = self.slot_mut(payload.batting_order, event)?;
                slot.player.clone_from(&payload.incoming);
                slot.position = payload.position;
                self.removed_players.push(payload.outgoing.clone());
            }
            (LineupEventKind::PositionChanged(payload), _) => {
                self.slot_mut(payload.batting_order, event)?.position = payload.position;
            }
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
            .ok_or_else(|| DomainError::Reconstruction("lineup stream is empty".into()))?;
        let mut lineup = Self::blank(first.metadata.aggregate_id, first.game_id);
        for event in events {
            lineup.apply(event)?;
        }
        Ok(lineup)
    }
}

impl Snapshottable for TeamLineup {
    type State = TeamLineupState;

    fn snapshot_state(&self) -> TeamLineupState {
        TeamLineupState {
            id: self.id,
            game_id: self.game_id,
            team_name: self.team_name.clone(),
            side: self.side,
            slots: self.slots.clone(),
            removed_players: self.removed_players.clone(),
        }
    }

    fn restore(state: TeamLineupState, version: i64) -> Result<Self, DomainError> {
        if version < 1 || state.id.is_nil() || state.game_id.is_nil() {
            return Err(DomainError::Reconstruction(format!(
                "invalid lineup snapshot for {} at version {version}",
                state.id
            )));
        }
        let mut slots = state.slots;
        slots.sort_by_key(|slot| slot.batting_order);
        Ok(Self {
            id: state.id,
            version,
            game_id: state.game_id,
            team_name: state.team_name,
            side: state.side,
            slots,
            removed_players: state.removed_players,
            uncommitted_events: Vec::new(),
        })
    }
}
