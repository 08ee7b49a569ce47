//! A small counter aggregate used to exercise the generic repository.

use chrono::{TimeZone, Utc};
use dugout_core::aggregate::{AggregateRoot, Snapshottable};
use dugout_core::clock::Clock;
use dugout_core::error::DomainError;
use dugout_core::event::{DomainEvent, EventMetadata};
use dugout_core::event_store::AggregateType;
use dugout_test_support::FixedClock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) const TALLY_OPENED_EVENT_TYPE: &str = "tally.opened";
pub(crate) const TALLY_INCREMENTED_EVENT_TYPE: &str = "tally.incremented";

pub(crate) fn fixed_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2026, 4, 1, 19, 5, 0).unwrap())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum TallyEventKind {
    Opened { label: String },
    Incremented { by: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TallyEvent {
    pub metadata: EventMetadata,
    pub kind: TallyEventKind,
}

impl DomainEvent for TallyEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            TallyEventKind::Opened { .. } => TALLY_OPENED_EVENT_TYPE,
            TallyEventKind::Incremented { .. } => TALLY_INCREMENTED_EVENT_TYPE,
        }
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn game_id(&self) -> Option<Uuid> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TallyState {
    pub id: Uuid,
    pub label: String,
    pub total: i64,
}

#[derive(Debug)]
pub(crate) struct Tally {
    id: Uuid,
    version: i64,
    pub label: String,
    pub total: i64,
    uncommitted_events: Vec<TallyEvent>,
}

impl Tally {
    fn blank() -> Self {
        Self {
            id: Uuid::nil(),
            version: 0,
            label: String::new(),
            total: 0,
            uncommitted_events: Vec::new(),
        }
    }

    pub fn open(label: &str, clock: &dyn Clock) -> Self {
        Self::open_with_id(Uuid::new_v4(), label, clock)
    }

    pub fn open_with_id(id: Uuid, label: &str, clock: &dyn Clock) -> Self {
        let mut tally = Self::blank();
        tally.id = id;
        tally.record(
            TallyEventKind::Opened {
                label: label.to_owned(),
            },
            clock,
        );
        tally
    }

    pub fn increment(&mut self, by: i64, clock: &dyn Clock) {
        self.record(TallyEventKind::Incremented { by }, clock);
    }

    fn record(&mut self, kind: TallyEventKind, clock: &dyn Clock) {
        let event_type = match kind {
            TallyEventKind::Opened { .. } => TALLY_OPENED_EVENT_TYPE,
            TallyEventKind::Incremented { .. } => TALLY_INCREMENTED_EVENT_TYPE,
        };
        let event = TallyEvent {
            metadata: EventMetadata::new(
                event_type,
                self.id,
                self.version + 1,
                Uuid::new_v4(),
                clock,
            ),
            kind,
        };
        self.apply(&event).unwrap();
        self.uncommitted_events.push(event);
    }
}

impl AggregateRoot for Tally {
    type Event = TallyEvent;

    const AGGREGATE_TYPE: AggregateType = AggregateType::Game;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) -> Result<(), DomainError> {
        match (&event.kind, self.version) {
            (TallyEventKind::Opened { label }, 0) => {
                self.id = event.metadata.aggregate_id;
                self.label.clone_from(label);
            }
            (TallyEventKind::Incremented { by }, v) if v > 0 => self.total += by,
            (_, _) => {
                return Err(DomainError::Reconstruction(format!(
                    "{} cannot follow version {}",
                    event.event_type(),
                    self.version
                )));
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
        if events.is_empty() {
            return Err(DomainError::Reconstruction("empty tally stream".into()));
        }
        let mut tally = Self::blank();
        for event in events {
            tally.apply(event)?;
        }
        Ok(tally)
    }
}

impl Snapshottable for Tally {
    type State = TallyState;

    fn snapshot_state(&self) -> TallyState {
        TallyState {
            id: self.id,
            label: self.label.clone(),
            total: self.total,
        }
    }

    fn restore(state: TallyState, version: i64) -> Result<Self, DomainError> {
        if version < 1 {
            return Err(DomainError::Reconstruction(
                "tally snapshot below version 1".into(),
            ));
        }
        Ok(Self {
            id: state.id,
            version,
            label: state.label,
            total: state.total,
            uncommitted_events: Vec::new(),
        })
    }
}
