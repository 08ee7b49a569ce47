//! Dugout Core — shared event-sourcing abstractions.
//!
//! This crate defines the traits and types that the stores, the repositories
//! and every bounded context depend on. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;
pub mod event_store;
pub mod snapshot;
pub mod stream;
