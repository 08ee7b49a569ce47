//! Dugout — Game bounded context.
//!
//! Responsible for a game's lifecycle (created, in progress, completed) and
//! its running score.

pub mod domain;
pub mod repository;
