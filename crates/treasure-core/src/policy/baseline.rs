//! Belief-agnostic strategies used as comparison baselines.

use super::SensingPolicy;
use crate::belief::BeliefTracker;
use crate::grid::Cell;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IteratorRandom;

/// Senses unobserved cells in row-major order.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowSweep;

impl SensingPolicy for RowSweep {
    fn name(&self) -> &'static str {
        "row_sweep"
    }

    fn choose(&mut self, tracker: &BeliefTracker) -> Cell {
        tracker
            .unobserved()
            .next()
            .unwrap_or_else(|| tracker.most_likely())
    }
}

/// Senses a uniformly random unobserved cell.
#[derive(Debug, Clone)]
pub struct RandomProbe {
    rng: SmallRng,
}

impl RandomProbe {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl SensingPolicy for RandomProbe {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose(&mut self, tracker: &BeliefTracker) -> Cell {
        tracker
            .unobserved()
            .choose(&mut self.rng)
            .unwrap_or_else(|| tracker.most_likely())
    }
}
