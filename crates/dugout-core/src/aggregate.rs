//! Aggregate root abstraction.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::event_store::AggregateType;

/// Trait for aggregate roots that reconstitute from event history.
///
/// Recording an event applies it immediately, so `version` counts the
/// uncommitted events as well; the version persisted before them is
/// `version() - uncommitted_events().len()`.
pub trait AggregateRoot: Send + Sync + Sized {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The aggregate type tag written with every event of this aggregate.
    const AGGREGATE_TYPE: AggregateType;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version (number of events applied).
    fn version(&self) -> i64;

    /// Apply an event to mutate internal state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` if the event cannot follow the
    /// current state.
    fn apply(&mut self, event: &Self::Event) -> Result<(), DomainError>;

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence.
    fn mark_events_as_committed(&mut self);

    /// Rebuilds an aggregate from its ordered event history.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` if `events` is empty, does not
    /// start with the aggregate's creation event, or cannot be applied.
    fn from_events(events: &[Self::Event]) -> Result<Self, DomainError>;
}

/// Aggregates whose state can be captured in, and restored from, a snapshot.
pub trait Snapshottable: AggregateRoot {
    /// Plain-data projection of the aggregate state.
    type State: Serialize + DeserializeOwned + Send;

    /// Captures the current state.
    fn snapshot_state(&self) -> Self::State;

    /// Restores an aggregate from a captured state at `version`, with no
    /// uncommitted events.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` if the state is inconsistent.
    fn restore(state: Self::State, version: i64) -> Result<Self, DomainError>;
}

/// Reports the length of an uncommitted event list as a version delta.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn event_count(events: &[impl DomainEvent]) -> i64 {
    events.len() as i64
}
