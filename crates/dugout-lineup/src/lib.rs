//! Dugout — Team lineup bounded context.
//!
//! Responsible for each team's batting order and defensive positions within
//! a game, including substitutions.

pub mod domain;
pub mod repository;
