//! Simulated search episodes: a hidden treasure, a noisy colour sensor and a policy.

use crate::belief::{BeliefError, BeliefMetrics, BeliefTracker, PositionFault};
use crate::grid::{Cell, manhattan_distance};
use crate::policy::SensingPolicy;
use crate::sensor::{ColorModel, ModelError, SensorColor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// One sensor reading taken during a hunt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub cell: Cell,
    pub color: SensorColor,
    pub distance: usize,
}

/// Stopping rules applied by [`Hunt::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuntLimits {
    pub max_sensings: usize,
    /// Stop once some cell carries at least this much probability.
    pub confidence: f64,
}

impl HuntLimits {
    /// Allows sensing every cell of a `size` x `size` grid.
    pub fn exhaustive(size: usize, confidence: f64) -> Self {
        Self {
            max_sensings: size.saturating_mul(size),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Confident,
    Exhausted,
    Budget,
}

impl StopReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            StopReason::Confident => "confident",
            StopReason::Exhausted => "exhausted",
            StopReason::Budget => "budget",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HuntOutcome {
    pub treasure: Cell,
    pub guess: Cell,
    pub found: bool,
    pub sensings: usize,
    pub stop: StopReason,
    pub metrics: BeliefMetrics,
}

#[derive(Debug, Clone)]
pub struct Hunt<'m> {
    treasure: Cell,
    tracker: BeliefTracker,
    model: &'m ColorModel,
    readings: Vec<Reading>,
    rng: StdRng,
    seed: u64,
}

impl<'m> Hunt<'m> {
    /// Places the treasure uniformly at random from `seed`.
    pub fn with_seed(size: usize, model: &'m ColorModel, seed: u64) -> Result<Self, HuntError> {
        let tracker = BeliefTracker::new(size)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let index = rng.gen_range(0..tracker.cell_count());
        let treasure = Cell::from_index(index, size).ok_or(BeliefError::EmptyGrid)?;
        Ok(Self {
            treasure,
            tracker,
            model,
            readings: Vec::new(),
            rng,
            seed,
        })
    }

    pub fn with_treasure(
        size: usize,
        treasure: Cell,
        model: &'m ColorModel,
        seed: u64,
    ) -> Result<Self, HuntError> {
        let tracker = BeliefTracker::new(size)?;
        if !treasure.in_bounds(size) {
            return Err(HuntError::TreasureOutOfBounds {
                cell: treasure,
                size,
            });
        }
        Ok(Self {
            treasure,
            tracker,
            model,
            readings: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            seed,
        })
    }

    pub fn treasure(&self) -> Cell {
        self.treasure
    }

    pub fn tracker(&self) -> &BeliefTracker {
        &self.tracker
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Takes a reading at `cell` and folds it into the belief.
    ///
    /// A rejected reading leaves the sensor noise stream where it was.
    pub fn sense(&mut self, cell: Cell) -> Result<SensorColor, HuntError> {
        if !self.tracker.is_unobserved(cell) {
            let size = self.tracker.size();
            let reason = if cell.in_bounds(size) {
                PositionFault::AlreadyObserved
            } else {
                PositionFault::OutOfBounds { size }
            };
            return Err(BeliefError::InvalidPosition { cell, reason }.into());
        }
        let distance = manhattan_distance(cell, self.treasure);
        let mut rng = self.rng.clone();
        let color = self.model.sample(distance, &mut rng)?;
        self.tracker.update(&color, cell, self.model)?;
        self.rng = rng;
        self.readings.push(Reading {
            cell,
            color,
            distance,
        });

        debug!(
            target: "treasure_core::hunt",
            seed = self.seed,
            row = cell.row,
            col = cell.col,
            color = color.as_str(),
            sensings = self.readings.len(),
            "sensor reading"
        );
        Ok(color)
    }

    /// Lets `policy` pick readings until one of `limits` triggers.
    pub fn run(
        &mut self,
        policy: &mut dyn SensingPolicy,
        limits: &HuntLimits,
    ) -> Result<HuntOutcome, HuntError> {
        let stop = loop {
            let metrics = BeliefMetrics::from_tracker(&self.tracker);
            if metrics.max_probability >= limits.confidence {
                break StopReason::Confident;
            }
            if self.tracker.unobserved_len() == 0 {
                break StopReason::Exhausted;
            }
            if self.readings.len() >= limits.max_sensings {
                break StopReason::Budget;
            }
            let cell = policy.choose(&self.tracker);
            self.sense(cell)?;
        };

        let metrics = BeliefMetrics::from_tracker(&self.tracker);
        let guess = metrics.most_likely;
        debug!(
            target: "treasure_core::hunt",
            seed = self.seed,
            policy = policy.name(),
            stop = stop.as_str(),
            found = guess == self.treasure,
            sensings = self.readings.len(),
            "hunt finished"
        );

        Ok(HuntOutcome {
            treasure: self.treasure,
            guess,
            found: guess == self.treasure,
            sensings: self.readings.len(),
            stop,
            metrics,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HuntError {
    Belief(BeliefError),
    Model(ModelError),
    TreasureOutOfBounds { cell: Cell, size: usize },
}

impl fmt::Display for HuntError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HuntError::Belief(err) => write!(f, "belief update failed: {err}"),
            HuntError::Model(err) => write!(f, "sensor model failed: {err}"),
            HuntError::TreasureOutOfBounds { cell, size } => {
                write!(f, "treasure {cell} lies outside the {size}x{size} grid")
            }
        }
    }
}

impl std::error::Error for HuntError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HuntError::Belief(err) => Some(err),
            HuntError::Model(err) => Some(err),
            HuntError::TreasureOutOfBounds { .. } => None,
        }
    }
}

impl From<BeliefError> for HuntError {
    fn from(err: BeliefError) -> Self {
        HuntError::Belief(err)
    }
}

impl From<ModelError> for HuntError {
    fn from(err: ModelError) -> Self {
        HuntError::Model(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Recommended, RowSweep};
    use crate::sensor::ColorBand;

    fn oracle_model() -> ColorModel {
        ColorModel::new(vec![
            ColorBand::new(0, 1.0, 0.0, 0.0, 0.0),
            ColorBand::new(1, 0.0, 1.0, 0.0, 0.0),
            ColorBand::new(2, 0.0, 0.0, 1.0, 0.0),
            ColorBand::new(3, 0.0, 0.0, 0.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn same_seed_replays_identically() {
        let model = ColorModel::default();
        let limits = HuntLimits::exhaustive(6, 0.95);
        let mut first = Hunt::with_seed(6, &model, 99).unwrap();
        let mut second = Hunt::with_seed(6, &model, 99).unwrap();
        let a = first.run(&mut Recommended, &limits).unwrap();
        let b = second.run(&mut Recommended, &limits).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.readings(), second.readings());
    }

    #[test]
    fn noiseless_sensor_pins_treasure_on_hit() {
        let model = oracle_model();
        let mut hunt = Hunt::with_treasure(4, Cell::new(2, 3), &model, 1).unwrap();
        let color = hunt.sense(Cell::new(2, 3)).unwrap();
        assert_eq!(color, SensorColor::Red);
        assert_eq!(hunt.tracker().probability(Cell::new(2, 3)), Some(1.0));
    }

    #[test]
    fn confident_stop_guesses_the_treasure() {
        let model = oracle_model();
        let treasure = Cell::new(1, 2);
        let mut hunt = Hunt::with_treasure(5, treasure, &model, 3).unwrap();
        let outcome = hunt
            .run(&mut RowSweep, &HuntLimits::exhaustive(5, 0.99))
            .unwrap();
        assert_eq!(outcome.stop, StopReason::Confident);
        assert!(outcome.found);
        assert_eq!(outcome.guess, treasure);
        assert_eq!(outcome.sensings, hunt.readings().len());
    }

    #[test]
    fn budget_caps_the_number_of_readings() {
        let model = ColorModel::default();
        let mut hunt = Hunt::with_seed(8, &model, 7).unwrap();
        let limits = HuntLimits {
            max_sensings: 3,
            confidence: 1.1,
        };
        let outcome = hunt.run(&mut Recommended, &limits).unwrap();
        assert_eq!(outcome.stop, StopReason::Budget);
        assert_eq!(outcome.sensings, 3);
    }

    #[test]
    fn unreachable_confidence_exhausts_the_grid() {
        let model = ColorModel::default();
        let mut hunt = Hunt::with_seed(3, &model, 21).unwrap();
        let outcome = hunt
            .run(&mut Recommended, &HuntLimits::exhaustive(3, 1.1))
            .unwrap();
        assert_eq!(outcome.stop, StopReason::Exhausted);
        assert_eq!(outcome.sensings, 9);
        assert_eq!(outcome.metrics.unobserved, 0);
    }

    #[test]
    fn rejected_readings_do_not_advance_the_noise_stream() {
        let model = ColorModel::default();
        let mut interrupted = Hunt::with_seed(6, &model, 42).unwrap();
        let mut clean = Hunt::with_seed(6, &model, 42).unwrap();

        interrupted.sense(Cell::new(0, 0)).unwrap();
        assert!(interrupted.sense(Cell::new(0, 0)).is_err());
        assert!(interrupted.sense(Cell::new(6, 1)).is_err());
        for cell in [Cell::new(2, 3), Cell::new(5, 5), Cell::new(1, 4)] {
            interrupted.sense(cell).unwrap();
        }

        for cell in [Cell::new(0, 0), Cell::new(2, 3), Cell::new(5, 5), Cell::new(1, 4)] {
            clean.sense(cell).unwrap();
        }

        assert_eq!(interrupted.readings(), clean.readings());
    }

    #[test]
    fn rejects_bad_positions() {
        let model = ColorModel::default();
        assert!(matches!(
            Hunt::with_treasure(3, Cell::new(3, 3), &model, 0),
            Err(HuntError::TreasureOutOfBounds { .. })
        ));

        let mut hunt = Hunt::with_seed(3, &model, 0).unwrap();
        let err = hunt.sense(Cell::new(0, 9)).unwrap_err();
        assert!(matches!(
            err,
            HuntError::Belief(BeliefError::InvalidPosition {
                reason: PositionFault::OutOfBounds { size: 3 },
                ..
            })
        ));
        assert!(hunt.readings().is_empty());
    }
}
