//! Domain model for the Game context.

pub mod aggregates;
pub mod events;
