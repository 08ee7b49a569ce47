//! Test event stores — mock `EventStore` implementations for tests.

use async_trait::async_trait;
use dugout_core::error::DomainError;
use dugout_core::event_store::{AggregateType, EventStore, NewEvent, StoredEvent};
use parking_lot::Mutex;
use uuid::Uuid;

/// One recorded `append` call.
#[derive(Debug, Clone)]
pub struct RecordedAppend {
    /// Stream appended to.
    pub stream_id: String,
    /// Aggregate type passed by the caller.
    pub aggregate_type: AggregateType,
    /// Expected version passed by the caller.
    pub expected_version: i64,
    /// Events passed by the caller.
    pub events: Vec<NewEvent>,
}

/// An event store that records every `append` call and always succeeds.
/// Every read returns the configured events unchanged.
#[derive(Debug)]
pub struct RecordingEventStore {
    load_result: Vec<StoredEvent>,
    appended: Mutex<Vec<RecordedAppend>>,
    deleted: Mutex<Vec<String>>,
}

impl RecordingEventStore {
    /// Create a new recording store that returns `load_result` from every
    /// read.
    #[must_use]
    pub fn new(load_result: Vec<StoredEvent>) -> Self {
        Self {
            load_result,
            appended: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of all recorded appends.
    pub fn appended_events(&self) -> Vec<RecordedAppend> {
        self.appended.lock().clone()
    }

    /// Returns the stream ids passed to `delete`.
    pub fn deleted_streams(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn append(
        &self,
        stream_id: &str,
        aggregate_type: AggregateType,
        events: &[NewEvent],
        expected_version: i64,
    ) -> Result<(), DomainError> {
        self.appended.lock().push(RecordedAppend {
            stream_id: stream_id.to_owned(),
            aggregate_type,
            expected_version,
            events: events.to_vec(),
        });
        Ok(())
    }

    async fn get_events(
        &self,
        _stream_id: &str,
        from_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let after = from_version.unwrap_or(0);
        Ok(self
            .load_result
            .iter()
            .filter(|e| e.stream_version > after)
            .cloned()
            .collect())
    }

    async fn get_all_events(&self) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.load_result.clone())
    }

    async fn get_events_by_type(
        &self,
        _aggregate_type: AggregateType,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.load_result.clone())
    }

    async fn get_events_by_game_id(
        &self,
        _game_id: Uuid,
        _aggregate_types: Option<&[AggregateType]>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.load_result.clone())
    }

    async fn current_version(&self, _stream_id: &str) -> Result<i64, DomainError> {
        Ok(self
            .load_result
            .iter()
            .map(|e| e.stream_version)
            .max()
            .unwrap_or(0))
    }

    async fn delete(&self, stream_id: &str) -> Result<(), DomainError> {
        self.deleted.lock().push(stream_id.to_owned());
        Ok(())
    }
}

/// An event store that holds nothing and silently accepts appends. Useful for
/// "aggregate not found" scenarios.
#[derive(Debug)]
pub struct EmptyEventStore;

#[async_trait]
impl EventStore for EmptyEventStore {
    async fn append(
        &self,
        _stream_id: &str,
        _aggregate_type: AggregateType,
        _events: &[NewEvent],
        _expected_version: i64,
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn get_events(
        &self,
        _stream_id: &str,
        _from_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn get_all_events(&self) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn get_events_by_type(
        &self,
        _aggregate_type: AggregateType,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn get_events_by_game_id(
        &self,
        _game_id: Uuid,
        _aggregate_types: Option<&[AggregateType]>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn current_version(&self, _stream_id: &str) -> Result<i64, DomainError> {
        Ok(0)
    }

    async fn delete(&self, _stream_id: &str) -> Result<(), DomainError> {
        Ok(())
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-propagation paths.
#[derive(Debug)]
pub struct FailingEventStore;

fn connection_refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(
        &self,
        _stream_id: &str,
        _aggregate_type: AggregateType,
        _events: &[NewEvent],
        _expected_version: i64,
    ) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn get_events(
        &self,
        _stream_id: &str,
        _from_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn get_all_events(&self) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn get_events_by_type(
        &self,
        _aggregate_type: AggregateType,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn get_events_by_game_id(
        &self,
        _game_id: Uuid,
        _aggregate_types: Option<&[AggregateType]>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn current_version(&self, _stream_id: &str) -> Result<i64, DomainError> {
        Err(connection_refused())
    }

    async fn delete(&self, _stream_id: &str) -> Result<(), DomainError> {
        Err(connection_refused())
    }
}
