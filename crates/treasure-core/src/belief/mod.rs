//! Bayesian belief tracking over treasure locations.
//!
//! This module is composed of:
//! - `tracker`: the posterior distribution, its update rule and the sensing recommendation.
//! - `telemetry`: summary metrics derived from a tracker snapshot.

mod telemetry;
mod tracker;

pub use telemetry::BeliefMetrics;
pub use tracker::{BeliefError, BeliefTracker, PositionFault};
