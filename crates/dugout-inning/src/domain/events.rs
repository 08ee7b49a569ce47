//! Domain events for the Inning state context.

use dugout_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bases::BasesState;

/// Emitted when tracking of a half-inning begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningStateCreated {
    /// The inning state identifier.
    pub inning_state_id: Uuid,
    /// The game being tracked.
    pub game_id: Uuid,
    /// Inning number, from 1.
    pub inning: u8,
    /// Whether the visitors are batting.
    pub is_top_half: bool,
}

/// Emitted after a play that changes who is on base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnersMoved {
    /// Bases after the play.
    pub bases: BasesState,
    /// Runs that crossed the plate on the play.
    pub runs_scored: u32,
}

/// Emitted when an out is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutRecorded {
    /// Outs in the half-inning after this one.
    pub outs: u8,
}

/// Emitted when the next batter steps in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatterChanged {
    /// Batting order slot now at the plate.
    pub batting_order: u8,
}

/// Emitted after the third out, moving play to the next half-inning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfInningEnded {
    /// Inning about to be played.
    pub next_inning: u8,
    /// Whether the next half is the top.
    pub next_is_top_half: bool,
}

/// Event type identifier for [`InningStateCreated`].
pub const INNING_STATE_CREATED_EVENT_TYPE: &str = "inning.created";

/// Event type identifier for [`RunnersMoved`].
pub const RUNNERS_MOVED_EVENT_TYPE: &str = "inning.runners_moved";

/// Event type identifier for [`OutRecorded`].
pub const OUT_RECORDED_EVENT_TYPE: &str = "inning.out_recorded";

/// Event type identifier for [`BatterChanged`].
pub const BATTER_CHANGED_EVENT_TYPE: &str = "inning.batter_changed";

/// Event type identifier for [`HalfInningEnded`].
pub const HALF_INNING_ENDED_EVENT_TYPE: &str = "inning.half_ended";

/// Event payload variants for the Inning state context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InningEventKind {
    /// Tracking has begun.
    InningStateCreated(InningStateCreated),
    /// Runners have moved.
    RunnersMoved(RunnersMoved),
    /// An out has been recorded.
    OutRecorded(OutRecorded),
    /// A new batter is up.
    BatterChanged(BatterChanged),
    /// A half-inning has ended.
    HalfInningEnded(HalfInningEnded),
}

impl InningEventKind {
    /// Event type identifier of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InningStateCreated(_) => INNING_STATE_CREATED_EVENT_TYPE,
            Self::RunnersMoved(_) => RUNNERS_MOVED_EVENT_TYPE,
            Self::OutRecorded(_) => OUT_RECORDED_EVENT_TYPE,
            Self::BatterChanged(_) => BATTER_CHANGED_EVENT_TYPE,
            Self::HalfInningEnded(_) => HALF_INNING_ENDED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Inning state context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The game being tracked.
    pub game_id: Uuid,
    /// Event-specific payload.
    pub kind: InningEventKind,
}

impl DomainEvent for InningEvent {
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
