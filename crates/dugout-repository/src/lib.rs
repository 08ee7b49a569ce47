//! Dugout repository — the bridge between aggregates and the event store.
//!
//! [`EventSourcedRepository`] saves an aggregate's uncommitted events with
//! optimistic concurrency and rebuilds aggregates by replay. When a
//! [`SnapshotManager`] is attached, reads start from the latest snapshot and
//! replay only the events appended after it.

pub mod repository;
pub mod snapshot_manager;

#[cfg(test)]
mod test_aggregate;

pub use repository::{EventSourcedRepository, ReplayedStream, reconstruct, reconstruct_streams};
pub use snapshot_manager::{LoadedStream, SnapshotManager, SnapshotOutcome};
