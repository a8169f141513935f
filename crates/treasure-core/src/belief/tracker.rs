//! Posterior over grid cells and the next-best-sensing heuristic.

use crate::grid::{Cell, closest_point, manhattan_distance, row_major};
use crate::sensor::ObservationModel;
use std::fmt;
use tracing::trace;

/// Probability mass over every cell of a square grid plus the cells not yet sensed.
///
/// Storage is row-major. Every "first maximum" tie-break resolves in that order.
#[derive(Debug, Clone)]
pub struct BeliefTracker {
    size: usize,
    probs: Vec<f64>,
    open: Vec<bool>,
    open_count: usize,
}

impl BeliefTracker {
    /// Creates a tracker with a uniform prior and every cell unobserved.
    pub fn new(size: usize) -> Result<Self, BeliefError> {
        if size == 0 {
            return Err(BeliefError::EmptyGrid);
        }
        let cells = size
            .checked_mul(size)
            .ok_or(BeliefError::GridTooLarge { size })?;
        Ok(Self {
            size,
            probs: vec![1.0 / cells as f64; cells],
            open: vec![true; cells],
            open_count: cells,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cell_count(&self) -> usize {
        self.probs.len()
    }

    /// Returns the posterior probability of `cell`, or `None` when it lies off the grid.
    pub fn probability(&self, cell: Cell) -> Option<f64> {
        cell.in_bounds(self.size)
            .then(|| self.probs[cell.to_index(self.size)])
    }

    pub fn is_unobserved(&self, cell: Cell) -> bool {
        cell.in_bounds(self.size) && self.open[cell.to_index(self.size)]
    }

    pub fn unobserved_len(&self) -> usize {
        self.open_count
    }

    /// Unobserved cells in row-major order.
    pub fn unobserved(&self) -> impl Iterator<Item = Cell> + '_ {
        row_major(self.size).filter(move |cell| self.open[cell.to_index(self.size)])
    }

    /// Every `(cell, probability)` pair in row-major order.
    pub fn distribution(&self) -> impl Iterator<Item = (Cell, f64)> + '_ {
        row_major(self.size).zip(self.probs.iter().copied())
    }

    pub fn total_mass(&self) -> f64 {
        self.probs.iter().sum()
    }

    pub fn unobserved_mass(&self) -> f64 {
        self.unobserved()
            .map(|cell| self.probs[cell.to_index(self.size)])
            .sum()
    }

    /// Cell with the highest probability over the whole grid, observed or not.
    pub fn most_likely(&self) -> Cell {
        first_max(self.distribution()).unwrap_or(Cell::new(0, 0))
    }

    /// Folds a sensor reading taken at `sensor` into the posterior.
    ///
    /// Every cell is reweighted by `model.likelihood(signal, d)` where `d` is its
    /// Manhattan distance to the sensor, then the distribution is renormalised and
    /// `sensor` leaves the unobserved set. Nothing is modified when an error is returned.
    pub fn update<M>(&mut self, signal: &M::Signal, sensor: Cell, model: &M) -> Result<(), BeliefError>
    where
        M: ObservationModel + ?Sized,
    {
        if !sensor.in_bounds(self.size) {
            return Err(BeliefError::InvalidPosition {
                cell: sensor,
                reason: PositionFault::OutOfBounds { size: self.size },
            });
        }
        let sensor_index = sensor.to_index(self.size);
        if !self.open[sensor_index] {
            return Err(BeliefError::InvalidPosition {
                cell: sensor,
                reason: PositionFault::AlreadyObserved,
            });
        }

        let mut posterior = Vec::with_capacity(self.probs.len());
        let mut total = 0.0;
        for (cell, prior) in self.distribution() {
            let distance = manhattan_distance(cell, sensor);
            let likelihood = model.likelihood(signal, distance);
            if !likelihood.is_finite() || likelihood < 0.0 {
                return Err(BeliefError::InvalidLikelihood {
                    distance,
                    value: likelihood,
                });
            }
            let mass = prior * likelihood;
            total += mass;
            posterior.push(mass);
        }

        if total <= 0.0 || !total.is_finite() {
            return Err(BeliefError::DegenerateDistribution { sensor });
        }

        for mass in &mut posterior {
            *mass /= total;
        }
        self.probs = posterior;
        self.open[sensor_index] = false;
        self.open_count -= 1;

        trace!(
            target: "treasure_core::belief",
            row = sensor.row,
            col = sensor.col,
            evidence = total,
            unobserved = self.open_count,
            "belief updated"
        );
        Ok(())
    }

    /// Recommends where to take the next reading.
    ///
    /// - No unobserved cells: the most likely cell overall.
    /// - Unobserved cells hold zero mass: the unobserved cell nearest to the most
    ///   likely cell overall.
    /// - Otherwise: the most likely unobserved cell.
    pub fn recommend_sensing(&self) -> Cell {
        if self.open_count == 0 {
            return self.most_likely();
        }

        if self.unobserved_mass() == 0.0 {
            let best = self.most_likely();
            return closest_point(best, self.unobserved()).unwrap_or(best);
        }

        let open = self
            .unobserved()
            .map(|cell| (cell, self.probs[cell.to_index(self.size)]));
        first_max(open).unwrap_or_else(|| self.most_likely())
    }
}

/// Linear scan keeping the earliest of equal maxima.
fn first_max<I>(entries: I) -> Option<Cell>
where
    I: IntoIterator<Item = (Cell, f64)>,
{
    let mut best: Option<(Cell, f64)> = None;
    for (cell, prob) in entries {
        match best {
            Some((_, best_prob)) if prob <= best_prob => {}
            _ => best = Some((cell, prob)),
        }
    }
    best.map(|(cell, _)| cell)
}

/// Why a sensing position was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFault {
    OutOfBounds { size: usize },
    AlreadyObserved,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BeliefError {
    EmptyGrid,
    GridTooLarge { size: usize },
    InvalidPosition { cell: Cell, reason: PositionFault },
    InvalidLikelihood { distance: usize, value: f64 },
    DegenerateDistribution { sensor: Cell },
}

impl fmt::Display for BeliefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeliefError::EmptyGrid => write!(f, "grid size must be at least 1"),
            BeliefError::GridTooLarge { size } => {
                write!(f, "a {size}x{size} grid has more cells than can be addressed")
            }
            BeliefError::InvalidPosition {
                cell,
                reason: PositionFault::OutOfBounds { size },
            } => write!(f, "sensor position {cell} lies outside the {size}x{size} grid"),
            BeliefError::InvalidPosition {
                cell,
                reason: PositionFault::AlreadyObserved,
            } => write!(f, "sensor position {cell} has already been observed"),
            BeliefError::InvalidLikelihood { distance, value } => {
                write!(f, "observation model returned {value} at distance {distance}")
            }
            BeliefError::DegenerateDistribution { sensor } => write!(
                f,
                "reading at {sensor} leaves no probability mass on any cell"
            ),
        }
    }
}

impl std::error::Error for BeliefError {}
