//! Grouping of a flat event list into per-stream groups.

use std::collections::HashMap;

use crate::event_store::{AggregateType, StoredEvent};

/// The events of one stream, taken from a larger scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGroup {
    /// The stream these events belong to.
    pub stream_id: String,
    /// Events in their original relative order.
    pub events: Vec<StoredEvent>,
    /// Index in the input of this stream's last event.
    pub last_seen: usize,
}

/// Partitions `events` into per-stream groups, keeping only streams of
/// `aggregate_type`.
///
/// Groups come back in order of first appearance; each keeps its events in
/// input order and records where its last event was seen, which is what
/// "most recently touched stream" queries rank by.
#[must_use]
pub fn group_by_stream(events: &[StoredEvent], aggregate_type: AggregateType) -> Vec<StreamGroup> {
    let mut groups: Vec<StreamGroup> = Vec::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();

    for (position, event) in events.iter().enumerate() {
        if event.aggregate_type != aggregate_type {
            continue;
        }
        if let Some(&slot) = index_of.get(event.stream_id.as_str()) {
            let group = &mut groups[slot];
            group.events.push(event.clone());
            group.last_seen = position;
        } else {
            index_of.insert(event.stream_id.as_str(), groups.len());
            groups.push(StreamGroup {
                stream_id: event.stream_id.clone(),
                events: vec![event.clone()],
                last_seen: position,
            });
        }
    }

    groups
}
