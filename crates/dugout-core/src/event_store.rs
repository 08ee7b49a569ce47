//! Event store contract and the stored event envelope.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{DomainEvent, encode_event};

/// The aggregate types whose streams share the event store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateType {
    /// A baseball game.
    Game,
    /// One team's batting order and field positions for a game.
    TeamLineup,
    /// The state of a half-inning in progress.
    InningState,
}

impl AggregateType {
    /// Every aggregate type, in declaration order.
    pub const ALL: [Self; 3] = [Self::Game, Self::TeamLineup, Self::InningState];

    /// Stable name persisted alongside each event.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Game => "Game",
            Self::TeamLineup => "TeamLineup",
            Self::InningState => "InningState",
        }
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::Reconstruction(format!("unknown aggregate type: {s}")))
    }
}

/// Provenance recorded with every stored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEventMetadata {
    /// Component that wrote the event.
    pub source: String,
    /// When the store accepted the event.
    pub created_at: DateTime<Utc>,
    /// Game the event correlates to, if any.
    pub game_id: Option<Uuid>,
    /// Correlation ID of the command that produced the event.
    pub correlation_id: Uuid,
}

/// An event on its way into the store. The store assigns its stream version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type name.
    pub event_type: String,
    /// Serialized domain event.
    pub event_data: String,
    /// Schema version of the payload.
    pub event_version: i32,
    /// When the domain event occurred.
    pub timestamp: DateTime<Utc>,
    /// Component that produced the event.
    pub source: String,
    /// Game the event correlates to, if any.
    pub game_id: Option<Uuid>,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
}

impl NewEvent {
    /// Serializes a domain event into a `NewEvent`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` if serialization fails.
    pub fn from_domain_event<E: DomainEvent>(event: &E, source: &str) -> Result<Self, DomainError> {
        let meta = event.metadata();
        Ok(Self {
            event_id: meta.event_id,
            event_type: event.event_type().to_owned(),
            event_data: encode_event(event)?,
            event_version: event.schema_version(),
            timestamp: meta.occurred_at,
            source: source.to_owned(),
            game_id: event.game_id(),
            correlation_id: meta.correlation_id,
        })
    }

    /// Wraps this event in its durable envelope at the given position.
    #[must_use]
    pub fn into_stored(
        self,
        stream_id: &str,
        aggregate_type: AggregateType,
        stream_version: i64,
        created_at: DateTime<Utc>,
    ) -> StoredEvent {
        StoredEvent {
            event_id: self.event_id,
            stream_id: stream_id.to_owned(),
            aggregate_type,
            event_type: self.event_type,
            event_data: self.event_data,
            event_version: self.event_version,
            stream_version,
            timestamp: self.timestamp,
            metadata: StoredEventMetadata {
                source: self.source,
                created_at,
                game_id: self.game_id,
                correlation_id: self.correlation_id,
            },
        }
    }
}

/// Durable representation of a domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Identifier of the owning aggregate.
    pub stream_id: String,
    /// Type of the owning aggregate.
    pub aggregate_type: AggregateType,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized domain event.
    pub event_data: String,
    /// Schema version of the payload.
    pub event_version: i32,
    /// 1-based position within the stream, assigned at append time.
    pub stream_version: i64,
    /// When the domain event occurred.
    pub timestamp: DateTime<Utc>,
    /// Provenance.
    pub metadata: StoredEventMetadata,
}

impl StoredEvent {
    /// Returns `true` if this event belongs to the given game, either because
    /// it is the game's own stream or because it correlates to the game.
    #[must_use]
    pub fn belongs_to_game(&self, game_id: Uuid) -> bool {
        self.metadata.game_id == Some(game_id) || self.stream_id == game_id.to_string()
    }
}

/// Append-only store of per-aggregate event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to a stream with optimistic concurrency.
    ///
    /// `expected_version` is the stream head the caller last saw. An empty
    /// `events` slice is a successful no-op.
    async fn append(
        &self,
        stream_id: &str,
        aggregate_type: AggregateType,
        events: &[NewEvent],
        expected_version: i64,
    ) -> Result<(), DomainError>;

    /// Loads a stream in append order, optionally only the events after
    /// `from_version`. Unknown streams yield an empty list.
    async fn get_events(
        &self,
        stream_id: &str,
        from_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Loads every event of every stream in global append order.
    async fn get_all_events(&self) -> Result<Vec<StoredEvent>, DomainError>;

    /// Loads every event of one aggregate type in global append order.
    async fn get_events_by_type(
        &self,
        aggregate_type: AggregateType,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Loads every event that belongs to a game, optionally restricted to
    /// some aggregate types, in global append order.
    async fn get_events_by_game_id(
        &self,
        game_id: Uuid,
        aggregate_types: Option<&[AggregateType]>,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Returns the head version of a stream, 0 if it has no events.
    async fn current_version(&self, stream_id: &str) -> Result<i64, DomainError>;

    /// Removes a whole stream. Administrative; unknown streams are ignored.
    async fn delete(&self, stream_id: &str) -> Result<(), DomainError>;
}

/// Rejects blank stream identifiers.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `stream_id` is empty or whitespace.
pub fn validate_stream_id(stream_id: &str) -> Result<(), DomainError> {
    if stream_id.trim().is_empty() {
        return Err(DomainError::Validation(
            "stream id must not be blank".to_owned(),
        ));
    }
    Ok(())
}

/// Rejects negative expected versions.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `expected_version` is negative.
pub fn validate_expected_version(expected_version: i64) -> Result<(), DomainError> {
    if expected_version < 0 {
        return Err(DomainError::Validation(format!(
            "expected version must be non-negative, got {expected_version}"
        )));
    }
    Ok(())
}

/// Rejects the nil UUID where an aggregate or game identifier is required.
///
/// # Errors
///
/// Returns `DomainError::Validation` naming `what` if `id` is nil.
pub fn validate_id(id: Uuid, what: &str) -> Result<(), DomainError> {
    if id.is_nil() {
        return Err(DomainError::Validation(format!("{what} must not be nil")));
    }
    Ok(())
}

/// Returns `true` if `aggregate_type` passes an optional type filter.
#[must_use]
pub fn type_filter_allows(filter: Option<&[AggregateType]>, aggregate_type: AggregateType) -> bool {
    filter.is_none_or(|types| types.contains(&aggregate_type))
}
