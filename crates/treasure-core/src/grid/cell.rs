use core::fmt;
use serde::{Deserialize, Serialize};

/// A grid coordinate addressed as `(row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub const fn in_bounds(self, size: usize) -> bool {
        self.row < size && self.col < size
    }

    /// Row-major offset of the cell in a `size` x `size` grid.
    pub const fn to_index(self, size: usize) -> usize {
        self.row * size + self.col
    }

    pub const fn from_index(index: usize, size: usize) -> Option<Self> {
        if size == 0 || index >= size * size {
            return None;
        }
        Some(Self::new(index / size, index % size))
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Self::new(row, col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Every cell of a `size` x `size` grid, row by row.
///
/// All tie-breaks in the crate resolve to the first cell in this order.
pub fn row_major(size: usize) -> impl Iterator<Item = Cell> {
    (0..size).flat_map(move |row| (0..size).map(move |col| Cell::new(row, col)))
}
