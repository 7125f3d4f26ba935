//! Row updates applied by each worker in a forward or reverse round.
//!
//! Forward round `i`: the pivot owner normalizes its row so that
//! $a_{pi} = 1$ and marks it, the normalized row $[\mathbf{a}_p \mid b_p]$ is
//! broadcast, and every unassigned row is updated as
//! $\mathbf{a}_j \leftarrow \mathbf{a}_j - a_{ji}\,\mathbf{a}_p$,
//! $b_j \leftarrow b_j - a_{ji}\,b_p$.
//!
//! Reverse round `i`: the pivot owner releases its row and broadcasts only
//! $b_p$ (already the solution component); every still-assigned row sets
//! $b_j \leftarrow b_j - a_{ji}\,b_p$ and $a_{ji} \leftarrow 0$.

use rayon::prelude::*;

use crate::rows::{LocalRowSet, PivotMarker};

/// Normalize local row `j` by its entry at `column`, mark it as the pivot
/// for `column`, and write `[row | rhs]` into `buffer` (length `n + 1`).
pub fn normalize_pivot(rows: &mut LocalRowSet, j: usize, column: usize, buffer: &mut [f64]) {
    let n = rows.dimension();
    debug_assert_eq!(buffer.len(), n + 1);

    let div = rows.row(j)[column];
    for a in rows.row_mut(j) {
        *a /= div;
    }
    *rows.rhs_mut(j) /= div;
    rows.set_marker(j, PivotMarker::PivotFor(column));

    buffer[..n].copy_from_slice(rows.row(j));
    buffer[n] = rows.rhs(j);
}

/// Eliminate `column` from every unassigned row using the broadcast pivot
/// row `pivot` (`n` coefficients followed by the right-hand side).
///
/// Rows are independent, so they are updated in parallel; the arithmetic per
/// row is identical to a sequential sweep.
pub fn eliminate_forward(rows: &mut LocalRowSet, pivot: &[f64], column: usize) {
    let n = rows.dimension();
    let (pivot_row, pivot_rhs) = (&pivot[..n], pivot[n]);
    let (coefficients, rhs, markers) = rows.parts_mut();

    coefficients
        .par_chunks_mut(n)
        .zip(rhs.par_iter_mut())
        .zip(markers.par_iter())
        .filter(|(_, marker)| marker.is_unassigned())
        .for_each(|((row, b), _)| {
            let mult = row[column];
            for (a, &p) in row.iter_mut().zip(pivot_row) {
                *a -= mult * p;
            }
            *b -= mult * pivot_rhs;
        });
}

/// Release local row `j` (its values are final) and return its right-hand
/// side for broadcast.
pub fn release_pivot(rows: &mut LocalRowSet, j: usize) -> f64 {
    rows.set_marker(j, PivotMarker::Unassigned);
    rows.rhs(j)
}

/// Back-substitute the broadcast solution component `pivot_rhs` for
/// `column` into every row still awaiting its own reverse round.
pub fn eliminate_reverse(rows: &mut LocalRowSet, pivot_rhs: f64, column: usize) {
    for j in 0..rows.len() {
        if rows.marker(j).is_unassigned() {
            continue;
        }
        let mult = rows.row(j)[column];
        rows.row_mut(j)[column] = 0.0;
        *rows.rhs_mut(j) -= mult * pivot_rhs;
    }
}
