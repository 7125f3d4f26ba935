//! Per-worker row storage and pivot-round bookkeeping.

use crate::solver::SolverError;

/// Which elimination round, if any, selected a row as its pivot.
///
/// A row moves `Unassigned -> PivotFor(i)` at most once, during forward
/// round `i`, and back to `Unassigned` exactly once, during the reverse round
/// for `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PivotMarker {
    #[default]
    Unassigned,
    PivotFor(usize),
}

impl PivotMarker {
    pub fn is_assigned(self) -> bool {
        matches!(self, PivotMarker::PivotFor(_))
    }

    pub fn is_unassigned(self) -> bool {
        !self.is_assigned()
    }

    /// The round (column) this row was pivot for.
    pub fn round(self) -> Option<usize> {
        match self {
            PivotMarker::PivotFor(i) => Some(i),
            PivotMarker::Unassigned => None,
        }
    }
}

/// The block of rows owned by one worker.
///
/// Coefficients are stored row-major, `dimension` values per row, alongside
/// one right-hand-side value and one [`PivotMarker`] per row.
#[derive(Debug, Clone)]
pub struct LocalRowSet {
    dimension: usize,
    first_row: usize,
    coefficients: Vec<f64>,
    rhs: Vec<f64>,
    markers: Vec<PivotMarker>,
}

impl LocalRowSet {
    /// Allocate a zeroed block of `rows` rows starting at global row
    /// `first_row`, with every marker `Unassigned`.
    pub fn allocate(dimension: usize, rows: usize, first_row: usize) -> Result<Self, SolverError> {
        let failed = || SolverError::Allocation { rows, dimension };
        let elements = rows.checked_mul(dimension).ok_or_else(failed)?;

        let mut coefficients = Vec::new();
        coefficients.try_reserve_exact(elements).map_err(|_| failed())?;
        coefficients.resize(elements, 0.0);

        let mut rhs = Vec::new();
        rhs.try_reserve_exact(rows).map_err(|_| failed())?;
        rhs.resize(rows, 0.0);

        let mut markers = Vec::new();
        markers.try_reserve_exact(rows).map_err(|_| failed())?;
        markers.resize(rows, PivotMarker::Unassigned);

        Ok(Self {
            dimension,
            first_row,
            coefficients,
            rhs,
            markers,
        })
    }

    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Global index of the first row in this block.
    pub fn first_row(&self) -> usize {
        self.first_row
    }

    pub fn row(&self, j: usize) -> &[f64] {
        let n = self.dimension;
        &self.coefficients[j * n..(j + 1) * n]
    }

    pub fn row_mut(&mut self, j: usize) -> &mut [f64] {
        let n = self.dimension;
        &mut self.coefficients[j * n..(j + 1) * n]
    }

    pub fn rhs(&self, j: usize) -> f64 {
        self.rhs[j]
    }

    pub fn rhs_mut(&mut self, j: usize) -> &mut f64 {
        &mut self.rhs[j]
    }

    pub fn marker(&self, j: usize) -> PivotMarker {
        self.markers[j]
    }

    pub fn set_marker(&mut self, j: usize, marker: PivotMarker) {
        self.markers[j] = marker;
    }

    pub fn markers(&self) -> &[PivotMarker] {
        &self.markers
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut [f64] {
        &mut self.coefficients
    }

    pub fn rhs_values(&self) -> &[f64] {
        &self.rhs
    }

    pub fn rhs_values_mut(&mut self) -> &mut [f64] {
        &mut self.rhs
    }

    /// Split borrows for updating rows while reading their markers.
    pub(crate) fn parts_mut(&mut self) -> (&mut [f64], &mut [f64], &[PivotMarker]) {
        (&mut self.coefficients, &mut self.rhs, &self.markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_starts_unassigned() {
        let rows = LocalRowSet::allocate(4, 3, 5).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.first_row(), 5);
        assert_eq!(rows.coefficients().len(), 12);
        assert!(rows.markers().iter().all(|m| m.is_unassigned()));
    }

    #[test]
    fn test_empty_block() {
        let rows = LocalRowSet::allocate(4, 0, 0).unwrap();
        assert!(rows.is_empty());
        assert!(rows.coefficients().is_empty());
    }

    #[test]
    fn test_overflowing_block_reports_allocation_failure() {
        let err = LocalRowSet::allocate(usize::MAX, 2, 0).unwrap_err();
        assert!(matches!(err, SolverError::Allocation { rows: 2, .. }));
    }

    #[test]
    fn test_marker_transitions() {
        let mut rows = LocalRowSet::allocate(2, 2, 0).unwrap();
        rows.set_marker(1, PivotMarker::PivotFor(0));
        assert!(rows.marker(1).is_assigned());
        assert_eq!(rows.marker(1).round(), Some(0));
        assert_eq!(rows.marker(0).round(), None);

        rows.set_marker(1, PivotMarker::Unassigned);
        assert!(rows.marker(1).is_unassigned());
    }

    #[test]
    fn test_row_views() {
        let mut rows = LocalRowSet::allocate(3, 2, 0).unwrap();
        rows.row_mut(1).copy_from_slice(&[1.0, 2.0, 3.0]);
        *rows.rhs_mut(1) = 9.0;
        assert_eq!(rows.row(1), &[1.0, 2.0, 3.0]);
        assert_eq!(rows.row(0), &[0.0, 0.0, 0.0]);
        assert_eq!(rows.rhs(1), 9.0);
        assert_eq!(rows.coefficients()[3..], [1.0, 2.0, 3.0]);
    }
}
