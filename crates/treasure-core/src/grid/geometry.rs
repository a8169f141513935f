use super::Cell;

/// `|Δrow| + |Δcol|` between two cells.
pub fn manhattan_distance(a: Cell, b: Cell) -> usize {
    a.row.abs_diff(b.row) + a.col.abs_diff(b.col)
}

/// Returns the candidate nearest to `target`; ties go to the earliest candidate.
pub fn closest_point<I>(target: Cell, candidates: I) -> Option<Cell>
where
    I: IntoIterator<Item = Cell>,
{
    let mut best: Option<(Cell, usize)> = None;
    for candidate in candidates {
        let distance = manhattan_distance(target, candidate);
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((candidate, distance)),
        }
    }
    best.map(|(cell, _)| cell)
}

/// Largest Manhattan distance between two cells of a `size` x `size` grid.
pub fn max_distance(size: usize) -> usize {
    size.saturating_sub(1).saturating_mul(2)
}
