//! Strategies choosing where the next sensor reading is taken.

mod baseline;

pub use baseline::{RandomProbe, RowSweep};

use crate::belief::BeliefTracker;
use crate::grid::Cell;
use serde::{Deserialize, Serialize};

/// Unified interface for sensing strategies driven by a belief tracker.
pub trait SensingPolicy: Send {
    fn name(&self) -> &'static str;

    /// Picks the next cell to sense. Must return an unobserved cell while any remain.
    fn choose(&mut self, tracker: &BeliefTracker) -> Cell;
}

/// Follows [`BeliefTracker::recommend_sensing`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Recommended;

impl SensingPolicy for Recommended {
    fn name(&self) -> &'static str {
        "recommended"
    }

    fn choose(&mut self, tracker: &BeliefTracker) -> Cell {
        tracker.recommend_sensing()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Recommended,
    RowSweep,
    Random,
}

impl PolicyKind {
    pub fn spawn(self, seed: u64) -> Box<dyn SensingPolicy> {
        match self {
            PolicyKind::Recommended => Box::new(Recommended),
            PolicyKind::RowSweep => Box::new(RowSweep),
            PolicyKind::Random => Box::new(RandomProbe::with_seed(seed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_policies_report_their_names() {
        assert_eq!(PolicyKind::Recommended.spawn(0).name(), "recommended");
        assert_eq!(PolicyKind::RowSweep.spawn(0).name(), "row_sweep");
        assert_eq!(PolicyKind::Random.spawn(0).name(), "random");
    }

    #[test]
    fn recommended_matches_tracker() {
        let tracker = BeliefTracker::new(3).unwrap();
        assert_eq!(Recommended.choose(&tracker), tracker.recommend_sensing());
    }
}
