//! Aggregate roots for the Inning state context.

use dugout_core::aggregate::{AggregateRoot, Snapshottable};
use dugout_core::clock::Clock;
use dugout_core::error::DomainError;
use dugout_core::event::{DomainEvent, EventMetadata};
use dugout_core::event_store::AggregateType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bases::BasesState;
use super::events::{
    BatterChanged, HalfInningEnded, InningEvent, InningEventKind, InningStateCreated, OutRecorded,
    RunnersMoved,
};

/// Outs that end a half-inning.
pub const OUTS_PER_HALF: u8 = 3;

/// Snapshot projection of an [`InningState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningSnapshot {
    /// The inning state identifier.
    pub id: Uuid,
    /// The game being tracked.
    pub game_id: Uuid,
    /// Inning number.
    pub inning: u8,
    /// Whether the visitors are batting.
    pub is_top_half: bool,
    /// Outs in the current half.
    pub outs: u8,
    /// Runners on base.
    pub bases: BasesState,
    /// Batting order slot at the plate.
    pub current_batter: u8,
    /// Runs scored in the current half.
    pub runs_this_half: u32,
}

/// The aggregate root for the live situation of a game.
#[derive(Debug)]
pub struct InningState {
    id: Uuid,
    version: i64,
    game_id: Uuid,
    inning: u8,
    is_top_half: bool,
    outs: u8,
    bases: BasesState,
    current_batter: u8,
    runs_this_half: u32,
    uncommitted_events: Vec<InningEvent>,
}

impl InningState {
    fn blank(id: Uuid, game_id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            game_id,
            inning: 1,
            is_top_half: true,
            outs: 0,
            bases: BasesState::empty(),
            current_batter: 1,
            runs_this_half: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Begins tracking a half-inning, producing an `InningStateCreated`
    /// event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if an id is nil or `inning` is 0.
    pub fn create(
        inning_state_id: Uuid,
        game_id: Uuid,
        inning: u8,
        is_top_half: bool,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        if inning_state_id.is_nil() || game_id.is_nil() {
            return Err(DomainError::Validation(
                "inning state and game ids must not be nil".into(),
            ));
        }
        if inning == 0 {
            return Err(DomainError::Validation("innings start at 1".into()));
        }
        let mut state = Self::blank(inning_state_id, game_id);
        state.record(
            InningEventKind::InningStateCreated(InningStateCreated {
                inning_state_id,
                game_id,
                inning,
                is_top_half,
            }),
            correlation_id,
            clock,
        )?;
        Ok(state)
    }

    /// Sets the bases after a play, producing a `RunnersMoved` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the half-inning is over, one
    /// runner occupies two bases, or the half's runs would overflow.
    pub fn move_runners(
        &mut self,
        bases: BasesState,
        runs_scored: u32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.require_half_open()?;
        if bases.has_duplicate_runner() {
            return Err(DomainError::Validation(
                "a runner cannot occupy two bases".into(),
            ));
        }
        if self.runs_this_half.checked_add(runs_scored).is_none() {
            return Err(DomainError::Validation(format!(
                "{runs_scored} more runs overflow the half-inning total"
            )));
        }
        self.record(
            InningEventKind::RunnersMoved(RunnersMoved { bases, runs_scored }),
            correlation_id,
            clock,
        )
    }

    /// Records an out, producing an `OutRecorded` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the half-inning already has
    /// three outs.
    pub fn record_out(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.require_half_open()?;
        self.record(
            InningEventKind::OutRecorded(OutRecorded {
                outs: self.outs + 1,
            }),
            correlation_id,
            clock,
        )
    }

    /// Puts the next batter at the plate, producing a `BatterChanged` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `batting_order` is not 1 through
    /// 9.
    pub fn change_batter(
        &mut self,
        batting_order: u8,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !(1..=9).contains(&batting_order) {
            return Err(DomainError::Validation(format!(
                "batting order must be 1 through 9, got {batting_order}"
            )));
        }
        self.record(
            InningEventKind::BatterChanged(BatterChanged { batting_order }),
            correlation_id,
            clock,
        )
    }

    /// Closes the half-inning after the third out, producing a
    /// `HalfInningEnded` event. Bases, outs and runs reset.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if fewer than three outs have been
    /// recorded.
    pub fn end_half_inning(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.outs < OUTS_PER_HALF {
            return Err(DomainError::Validation(format!(
                "half-inning has only {} outs",
                self.outs
            )));
        }
        let (next_inning, next_is_top_half) = if self.is_top_half {
            (self.inning, false)
        } else {
            (self.inning.saturating_add(1), true)
        };
        self.record(
            InningEventKind::HalfInningEnded(HalfInningEnded {
                next_inning,
                next_is_top_half,
            }),
            correlation_id,
            clock,
        )
    }

    /// The game being tracked.
    #[must_use]
    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    /// Inning number.
    #[must_use]
    pub fn inning(&self) -> u8 {
        self.inning
    }

    /// Whether the visitors are batting.
    #[must_use]
    pub fn is_top_half(&self) -> bool {
        self.is_top_half
    }

    /// Outs in the current half.
    #[must_use]
    pub fn outs(&self) -> u8 {
        self.outs
    }

    /// Runners on base.
    #[must_use]
    pub fn bases(&self) -> &BasesState {
        &self.bases
    }

    /// Batting order slot at the plate.
    #[must_use]
    pub fn current_batter(&self) -> u8 {
        self.current_batter
    }

    /// Runs scored in the current half.
    #[must_use]
    pub fn runs_this_half(&self) -> u32 {
        self.runs_this_half
    }

    fn require_half_open(&self) -> Result<(), DomainError> {
        if self.outs >= OUTS_PER_HALF {
            return Err(DomainError::Validation(
                "the half-inning is over".into(),
            ));
        }
        Ok(())
    }

    fn record(
        &mut self,
        kind: InningEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let event = InningEvent {
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
}

impl AggregateRoot for InningState {
    type Event = InningEvent;

    const AGGREGATE_TYPE: AggregateType = AggregateType::InningState;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) -> Result<(), DomainError> {
        match (&event.kind, self.version) {
            (InningEventKind::InningStateCreated(payload), 0) => {
                self.id = payload.inning_state_id;
                self.game_id = payload.game_id;
                self.inning = payload.inning;
                self.is_top_half = payload.is_top_half;
            }
            (InningEventKind::InningStateCreated(_), _) | (_, 0) => {
                return Err(DomainError::Reconstruction(format!(
                    "{} cannot follow version {} of inning state {}",
                    event.event_type(),
                    self.version,
                    self.id
                )));
            }
            (InningEventKind::RunnersMoved(payload), _) => {
                self.runs_this_half = self
                    .runs_this_half
                    .checked_add(payload.runs_scored)
                    .ok_or_else(|| {
                        DomainError::Reconstruction(format!(
                            "runs this half overflow in inning state {}",
                            self.id
                        ))
                    })?;
                self.bases = payload.bases.clone();
            }
            (InningEventKind::OutRecorded(payload), _) => {
                if payload.outs > OUTS_PER_HALF {
                    return Err(DomainError::Reconstruction(format!(
                        "out {} recorded in inning state {}",
                        payload.outs, self.id
                    )));
                }
                self.outs = payload.outs;
            }
            (InningEventKind::BatterChanged(payload), _) => {
                self.current_batter = payload.batting_order;
            }
            (InningEventKind::HalfInningEnded(payload), _) => {
                self.inning = payload.next_inning;
                self.is_top_half = payload.next_is_top_half;
                self.outs = 0;
                self.bases = BasesState::empty();
                self.runs_this_half = 0;
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
        let first = events.first().ok_or_else(|| {
            DomainError::Reconstruction("inning state stream is empty".into())
        })?;
        let mut state = Self::blank(first.metadata.aggregate_id, first.game_id);
        for event in events {
            state.apply(event)?;
        }
        Ok(state)
    }
}

impl Snapshottable for InningState {
    type State = InningSnapshot;

    fn snapshot_state(&self) -> InningSnapshot {
        InningSnapshot {
            id: self.id,
            game_id: self.game_id,
            inning: self.inning,
            is_top_half: self.is_top_half,
            outs: self.outs,
            bases: self.bases.clone(),
            current_batter: self.current_batter,
            runs_this_half: self.runs_this_half,
        }
    }

    fn restore(state: InningSnapshot, version: i64) -> Result<Self, DomainError> {
        if version < 1 || state.id.is_nil() || state.outs > OUTS_PER_HALF {
            return Err(DomainError::Reconstruction(format!(
                "invalid inning snapshot for {} at version {version}",
                state.id
            )));
        }
        Ok(Self {
            id: state.id,
            version,
            game_id: state.game_id,
            inning: state.inning,
            is_top_half: state.is_top_half,
            outs: state.outs,
            bases: state.bases,
            current_batter: state.current_batter,
            runs_this_half: state.runs_this_half,
            uncommitted_events: Vec::new(),
        })
    }
}
