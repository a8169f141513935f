//! Observation models mapping a sensed signal and a distance to a likelihood.

mod color;
mod model;

pub use color::{ParseColorError, SensorColor};
pub use model::{ColorBand, ColorModel, ModelError, ObservationModel};
