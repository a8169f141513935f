use super::BeliefTracker;
use crate::grid::Cell;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeliefMetrics {
    /// Shannon entropy of the distribution in nats.
    pub entropy: f64,
    pub max_probability: f64,
    pub most_likely: Cell,
    pub unobserved: usize,
    pub unobserved_mass: f64,
}

impl BeliefMetrics {
    pub fn from_tracker(tracker: &BeliefTracker) -> Self {
        let mut entropy = 0.0;
        for (_, prob) in tracker.distribution() {
            if prob > 0.0 {
                entropy -= prob * prob.ln();
            }
        }
        let most_likely = tracker.most_likely();

        Self {
            entropy,
            max_probability: tracker.probability(most_likely).unwrap_or(0.0),
            most_likely,
            unobserved: tracker.unobserved_len(),
            unobserved_mass: tracker.unobserved_mass(),
        }
    }
}
