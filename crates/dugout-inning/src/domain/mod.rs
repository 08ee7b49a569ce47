//! Domain model for the Inning state context.

pub mod aggregates;
pub mod bases;
pub mod events;
