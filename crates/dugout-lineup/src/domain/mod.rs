//! Domain model for the Team lineup context.

pub mod aggregates;
pub mod events;
