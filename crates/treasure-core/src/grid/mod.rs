//! Square grid coordinates and the distance helpers used by belief updates.

mod cell;
mod geometry;

pub use cell::{Cell, row_major};
pub use geometry::{closest_point, manhattan_distance, max_distance};
