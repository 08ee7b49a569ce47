//! Base-runner value objects.

use serde::{Deserialize, Serialize};

/// A player standing on a base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runner {
    /// Player name.
    pub player: String,
    /// The runner's batting order slot.
    pub batting_order: u8,
}

impl Runner {
    /// Creates a runner.
    #[must_use]
    pub fn new(player: &str, batting_order: u8) -> Self {
        Self {
            player: player.to_owned(),
            batting_order,
        }
    }
}

/// Occupancy of first, second and third base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasesState {
    /// Runner on first.
    pub first: Option<Runner>,
    /// Runner on second.
    pub second: Option<Runner>,
    /// Runner on third.
    pub third: Option<Runner>,
}

impl BasesState {
    /// Nobody on.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Occupied bases, first to third.
    pub fn runners(&self) -> impl Iterator<Item = &Runner> {
        [&self.first, &self.second, &self.third]
            .into_iter()
            .flatten()
    }

    /// Number of runners on base.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.runners().count()
    }

    /// Returns `true` if every base is occupied.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.occupied() == 3
    }

    /// Returns `true` if one batting slot appears on two bases.
    #[must_use]
    pub fn has_duplicate_runner(&self) -> bool {
        let slots: Vec<u8> = self.runners().map(|r| r.batting_order).collect();
        slots
            .iter()
            .enumerate()
            .any(|(i, slot)| slots[i + 1..].contains(slot))
    }
}
