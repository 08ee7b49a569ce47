//! Shared test doubles and utilities for the Dugout scorekeeping engine.

mod clock;
mod event_store;
mod logging;
mod snapshot_store;

pub use clock::FixedClock;
pub use event_store::{EmptyEventStore, FailingEventStore, RecordedAppend, RecordingEventStore};
pub use logging::init_tracing;
pub use snapshot_store::FailingSnapshotStore;
