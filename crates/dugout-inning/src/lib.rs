//! Dugout — Inning state bounded context.
//!
//! Tracks the live situation of a half-inning: outs, runners on base, the
//! batter due up and runs scored.

pub mod domain;
pub mod repository;
