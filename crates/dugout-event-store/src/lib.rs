//! Dugout event store — event and snapshot persistence.
//!
//! Two interchangeable event stores share the `EventStore` contract from
//! `dugout-core`: [`InMemoryEventStore`] for tests and ephemeral sessions,
//! and [`SqliteEventStore`] for durable local storage. Snapshot stores follow
//! the same split.

pub mod config;
pub mod in_memory_event_store;
pub mod schema;
pub mod snapshot_store;
pub mod sqlite_event_store;

pub use config::{ConfigError, SnapshotConfig, SqliteStoreConfig};
pub use in_memory_event_store::InMemoryEventStore;
pub use snapshot_store::{InMemorySnapshotStore, SqliteSnapshotStore};
pub use sqlite_event_store::SqliteEventStore;
