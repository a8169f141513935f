use super::SensorColor;
use crate::grid::max_distance;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Likelihood of a sensed signal given the Manhattan distance to the target.
///
/// Implementations must be pure in `(signal, distance)` and return a finite,
/// non-negative value. Values need not sum to one across signals.
pub trait ObservationModel {
    type Signal;

    fn likelihood(&self, signal: &Self::Signal, distance: usize) -> f64;
}

impl<M: ObservationModel + ?Sized> ObservationModel for &M {
    type Signal = M::Signal;

    fn likelihood(&self, signal: &Self::Signal, distance: usize) -> f64 {
        (**self).likelihood(signal, distance)
    }
}

/// Colour weights for every distance up to and including `up_to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorBand {
    pub up_to: usize,
    pub red: f64,
    pub orange: f64,
    pub yellow: f64,
    pub green: f64,
}

impl ColorBand {
    pub const fn new(up_to: usize, red: f64, orange: f64, yellow: f64, green: f64) -> Self {
        Self {
            up_to,
            red,
            orange,
            yellow,
            green,
        }
    }

    pub fn weight(&self, color: SensorColor) -> f64 {
        match color {
            SensorColor::Red => self.red,
            SensorColor::Orange => self.orange,
            SensorColor::Yellow => self.yellow,
            SensorColor::Green => self.green,
        }
    }

    pub fn weights(&self) -> [f64; 4] {
        [self.red, self.orange, self.yellow, self.green]
    }

    pub fn total(&self) -> f64 {
        self.weights().iter().sum()
    }
}

/// Lookup-table sensor model: distance band → colour distribution.
///
/// Bands are ordered by `up_to`; a distance is served by the first band that
/// covers it and anything beyond the last band reuses the last band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ColorBand>", into = "Vec<ColorBand>")]
pub struct ColorModel {
    bands: Vec<ColorBand>,
}

impl Default for ColorModel {
    fn default() -> Self {
        Self {
            bands: vec![
                ColorBand::new(0, 0.70, 0.15, 0.10, 0.05),
                ColorBand::new(2, 0.17, 0.60, 0.17, 0.06),
                ColorBand::new(4, 0.06, 0.17, 0.60, 0.17),
                ColorBand::new(5, 0.05, 0.10, 0.15, 0.70),
            ],
        }
    }
}

impl ColorModel {
    pub fn new(bands: Vec<ColorBand>) -> Result<Self, ModelError> {
        validate_bands(&bands)?;
        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[ColorBand] {
        &self.bands
    }

    pub fn band_for(&self, distance: usize) -> &ColorBand {
        let last = self.bands.len() - 1;
        self.bands
            .iter()
            .find(|band| distance <= band.up_to)
            .unwrap_or(&self.bands[last])
    }

    /// Bands that no pair of cells on a `size` x `size` grid is far enough apart to use.
    pub fn unreachable_bands(&self, size: usize) -> Vec<usize> {
        let furthest = max_distance(size);
        self.bands
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].up_to >= furthest)
            .map(|(index, _)| index + 1)
            .collect()
    }

    /// `P(color | distance)`, normalised within the band.
    pub fn probability(&self, color: SensorColor, distance: usize) -> f64 {
        let band = self.band_for(distance);
        band.weight(color) / band.total()
    }

    /// Draws the colour a sensor would report at `distance` from the target.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        distance: usize,
        rng: &mut R,
    ) -> Result<SensorColor, ModelError> {
        let band = self.band_for(distance);
        let index = WeightedIndex::new(band.weights())
            .map_err(|err| ModelError::Sampling(err.to_string()))?;
        let picked = index.sample(rng);
        SensorColor::from_index(picked).ok_or_else(|| ModelError::Sampling(picked.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl ObservationModel for ColorModel {
    type Signal = SensorColor;

    fn likelihood(&self, signal: &SensorColor, distance: usize) -> f64 {
        self.probability(*signal, distance)
    }
}

impl TryFrom<Vec<ColorBand>> for ColorModel {
    type Error = ModelError;

    fn try_from(bands: Vec<ColorBand>) -> Result<Self, Self::Error> {
        Self::new(bands)
    }
}

impl From<ColorModel> for Vec<ColorBand> {
    fn from(model: ColorModel) -> Self {
        model.bands
    }
}

fn validate_bands(bands: &[ColorBand]) -> Result<(), ModelError> {
    if bands.is_empty() {
        return Err(ModelError::Empty);
    }

    for (index, band) in bands.iter().enumerate() {
        if index > 0 && band.up_to <= bands[index - 1].up_to {
            return Err(ModelError::UnorderedBands { band: index });
        }
        for color in SensorColor::ALL {
            let value = band.weight(color);
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidWeight {
                    band: index,
                    color,
                    value,
                });
            }
        }
        if band.total() <= 0.0 {
            return Err(ModelError::ZeroMassBand { band: index });
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    Empty,
    UnorderedBands {
        band: usize,
    },
    InvalidWeight {
        band: usize,
        color: SensorColor,
        value: f64,
    },
    ZeroMassBand {
        band: usize,
    },
    Sampling(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Empty => write!(f, "colour model needs at least one band"),
            ModelError::UnorderedBands { band } => {
                write!(f, "band {band} does not extend past the previous band")
            }
            ModelError::InvalidWeight { band, color, value } => {
                write!(f, "band {band} has invalid {color} weight {value}")
            }
            ModelError::ZeroMassBand { band } => write!(f, "band {band} has no colour mass"),
            ModelError::Sampling(reason) => write!(f, "failed to sample sensor colour: {reason}"),
        }
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn default_bands_favour_their_colour() {
        let model = ColorModel::default();
        assert!(model.probability(SensorColor::Red, 0) > 0.5);
        assert!(model.probability(SensorColor::Orange, 2) > 0.5);
        assert!(model.probability(SensorColor::Yellow, 3) > 0.5);
        assert!(model.probability(SensorColor::Green, 17) > 0.5);
    }

    #[test]
    fn probabilities_sum_to_one_per_distance() {
        let model = ColorModel::default();
        for distance in 0..12 {
            let sum: f64 = SensorColor::ALL
                .iter()
                .map(|color| model.likelihood(color, distance))
                .sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn unnormalised_weights_are_rescaled() {
        let model = ColorModel::new(vec![ColorBand::new(0, 2.0, 1.0, 1.0, 0.0)]).unwrap();
        assert!((model.probability(SensorColor::Red, 0) - 0.5).abs() < 1e-12);
        assert_eq!(model.probability(SensorColor::Green, 9), 0.0);
    }

    #[test]
    fn rejects_malformed_tables() {
        assert_eq!(ColorModel::new(Vec::new()), Err(ModelError::Empty));
        assert_eq!(
            ColorModel::new(vec![
                ColorBand::new(2, 1.0, 0.0, 0.0, 0.0),
                ColorBand::new(2, 0.0, 1.0, 0.0, 0.0),
            ]),
            Err(ModelError::UnorderedBands { band: 1 })
        );
        assert!(matches!(
            ColorModel::new(vec![ColorBand::new(0, -0.1, 1.0, 0.0, 0.0)]),
            Err(ModelError::InvalidWeight {
                band: 0,
                color: SensorColor::Red,
                ..
            })
        ));
        assert_eq!(
            ColorModel::new(vec![ColorBand::new(0, 0.0, 0.0, 0.0, 0.0)]),
            Err(ModelError::ZeroMassBand { band: 0 })
        );
    }

    #[test]
    fn small_grids_cannot_reach_far_bands() {
        let model = ColorModel::default();
        assert!(model.unreachable_bands(8).is_empty());
        assert!(model.unreachable_bands(4).is_empty());
        assert_eq!(model.unreachable_bands(3), vec![3]);
        assert_eq!(model.unreachable_bands(2), vec![2, 3]);
        assert_eq!(model.unreachable_bands(1), vec![1, 2, 3]);
    }

    #[test]
    fn json_loading_validates_bands() {
        let json = ColorModel::default().to_json().unwrap();
        assert_eq!(ColorModel::from_json(&json).unwrap(), ColorModel::default());

        let bad = r#"[{"up_to": 0, "red": 0.0, "orange": 0.0, "yellow": 0.0, "green": 0.0}]"#;
        assert!(ColorModel::from_json(bad).is_err());
    }

    #[test]
    fn sampling_never_draws_zero_weight_colours() {
        let model = ColorModel::new(vec![
            ColorBand::new(0, 1.0, 0.0, 0.0, 0.0),
            ColorBand::new(1, 0.0, 0.0, 0.5, 0.5),
        ])
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..200 {
            assert_eq!(model.sample(0, &mut rng).unwrap(), SensorColor::Red);
            let far = model.sample(6, &mut rng).unwrap();
            assert!(matches!(far, SensorColor::Yellow | SensorColor::Green));
        }
    }
}
