//! In-memory implementation of the `EventStore` trait.
//!
//! Streams live in a map from stream id to an ordered entry list. Each entry
//! also carries a store-wide position so cross-stream reads can be returned
//! in global append order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dugout_core::clock::{Clock, SystemClock};
use dugout_core::error::DomainError;
use dugout_core::event_store::{
    AggregateType, EventStore, NewEvent, StoredEvent, type_filter_allows, validate_expected_version,
    validate_id, validate_stream_id,
};
use parking_lot::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    position: u64,
    event: StoredEvent,
}

#[derive(Debug, Default)]
struct Log {
    streams: HashMap<String, Vec<Entry>>,
    next_position: u64,
}

impl Log {
    fn head(&self, stream_id: &str) -> i64 {
        self.streams
            .get(stream_id)
            .and_then(|entries| entries.last())
            .map_or(0, |entry| entry.event.stream_version)
    }

    /// Every entry matching `keep`, sorted by global position.
    fn scan(&self, keep: impl Fn(&StoredEvent) -> bool) -> Vec<StoredEvent> {
        let mut entries: Vec<&Entry> = self
            .streams
            .values()
            .flatten()
            .filter(|entry| keep(&entry.event))
            .collect();
        entries.sort_by_key(|entry| entry.position);
        entries.into_iter().map(|entry| entry.event.clone()).collect()
    }
}

/// Event store kept entirely in process memory.
pub struct InMemoryEventStore {
    log: RwLock<Log>,
    clock: Arc<dyn Clock>,
}

impl InMemoryEventStore {
    /// Creates an empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            log: RwLock::new(Log::default()),
            clock,
        }
    }

    /// Number of events held across all streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.read().streams.values().map(Vec::len).sum()
    }

    /// Returns `true` if no stream holds any event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("streams", &self.log.read().streams.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        stream_id: &str,
        aggregate_type: AggregateType,
        events: &[NewEvent],
        expected_version: i64,
    ) -> Result<(), DomainError> {
        validate_stream_id(stream_id)?;
        validate_expected_version(expected_version)?;
        if events.is_empty() {
            return Ok(());
        }

        let created_at = self.clock.now();
        let mut log = self.log.write();
        let actual = log.head(stream_id);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                stream_id: stream_id.to_owned(),
                expected: expected_version,
                actual,
            });
        }

        let Log {
            streams,
            next_position,
        } = &mut *log;
        let stream = streams.entry(stream_id.to_owned()).or_default();
        let mut stream_version = expected_version;
        for event in events {
            stream_version += 1;
            stream.push(Entry {
                position: *next_position,
                event: event.clone().into_stored(
                    stream_id,
                    aggregate_type,
                    stream_version,
                    created_at,
                ),
            });
            *next_position += 1;
        }

        tracing::debug!(
            stream_id,
            aggregate_type = %aggregate_type,
            expected_version,
            new_version = stream_version,
            event_count = events.len(),
            "appended events to in-memory stream"
        );
        Ok(())
    }

    async fn get_events(
        &self,
        stream_id: &str,
        from_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        validate_stream_id(stream_id)?;
        let after = from_version.unwrap_or(0);
        let log = self.log.read();
        Ok(log
            .streams
            .get(stream_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.event.stream_version > after)
                    .map(|entry| entry.event.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_all_events(&self) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.log.read().scan(|_| true))
    }

    async fn get_events_by_type(
        &self,
        aggregate_type: AggregateType,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .log
            .read()
            .scan(|event| event.aggregate_type == aggregate_type))
    }

    async fn get_events_by_game_id(
        &self,
        game_id: Uuid,
        aggregate_types: Option<&[AggregateType]>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        validate_id(game_id, "game id")?;
        Ok(self.log.read().scan(|event| {
            type_filter_allows(aggregate_types, event.aggregate_type)
                && event.belongs_to_game(game_id)
        }))
    }

    async fn current_version(&self, stream_id: &str) -> Result<i64, DomainError> {
        validate_stream_id(stream_id)?;
        Ok(self.log.read().head(stream_id))
    }

    async fn delete(&self, stream_id: &str) -> Result<(), DomainError> {
        validate_stream_id(stream_id)?;
        let removed = self.log.write().streams.remove(stream_id);
        tracing::info!(
            stream_id,
            removed_events = removed.map_or(0, |entries| entries.len()),
            "deleted in-memory stream"
        );
        Ok(())
    }
}
