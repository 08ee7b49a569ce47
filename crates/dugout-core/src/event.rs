//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::DomainError;
use crate::event_store::StoredEvent;

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name for deserialization routing.
    pub event_type: String,
    /// Aggregate/stream this event belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate version once this event is applied.
    pub sequence_number: i64,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    /// Builds metadata for a freshly recorded event. The causation ID is the
    /// correlation ID, since the event is the direct effect of a command.
    #[must_use]
    pub fn new(
        event_type: &str,
        aggregate_id: Uuid,
        sequence_number: i64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_owned(),
            aggregate_id,
            sequence_number,
            correlation_id,
            causation_id: correlation_id,
            occurred_at: clock.now(),
        }
    }
}

/// Trait that all domain events implement.
///
/// The whole event (metadata and payload) is what gets serialized into a
/// stored event's `event_data`, so it must round-trip through serde.
pub trait DomainEvent: Send + Sync + std::fmt::Debug + Serialize + DeserializeOwned {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;

    /// Schema version of the payload.
    fn schema_version(&self) -> i32 {
        1
    }

    /// The game this event correlates to, if any.
    fn game_id(&self) -> Option<Uuid>;
}

/// Serializes a domain event into the string form kept in `event_data`.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` if the event cannot be serialized.
pub fn encode_event<E: DomainEvent>(event: &E) -> Result<String, DomainError> {
    serde_json::to_string(event).map_err(|e| {
        DomainError::Reconstruction(format!(
            "event serialization failed for {}: {e}",
            event.event_type()
        ))
    })
}

/// Deserializes the domain event held by a stored event.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` if the payload is malformed or its
/// type does not match the envelope's `event_type`.
pub fn decode_event<E: DomainEvent>(stored: &StoredEvent) -> Result<E, DomainError> {
    let event: E = serde_json::from_str(&stored.event_data).map_err(|e| {
        DomainError::Reconstruction(format!(
            "event deserialization failed for {} at {}#{}: {e}",
            stored.event_type, stored.stream_id, stored.stream_version
        ))
    })?;
    if event.event_type() != stored.event_type {
        return Err(DomainError::Reconstruction(format!(
            "event type mismatch at {}#{}: envelope says {}, payload is {}",
            stored.stream_id,
            stored.stream_version,
            stored.event_type,
            event.event_type()
        )));
    }
    Ok(event)
}
