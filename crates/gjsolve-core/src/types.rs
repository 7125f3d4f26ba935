//! Core types shared across the solver.
//!
//! [`AugmentedSystem`] is the input held by the coordinator before
//! distribution; [`ReducedSystem`] is what the coordinator holds after
//! collection, with rows in worker-scatter order.

use std::borrow::Cow;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::solver::SolverError;

/// A dense linear system $\mathbf{A}\mathbf{x} = \mathbf{b}$.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedSystem {
    /// Coefficient matrix $\mathbf{A}$ ($n \times n$).
    pub matrix: Array2<f64>,
    /// Right-hand side $\mathbf{b}$ (length $n$).
    pub rhs: Array1<f64>,
}

impl AugmentedSystem {
    /// Build a system, checking that the matrix is square and the RHS fits.
    pub fn new(matrix: Array2<f64>, rhs: Array1<f64>) -> Result<Self, SolverError> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(SolverError::InvalidSystem(format!(
                "coefficient matrix must be square, got {}x{}",
                rows, cols
            )));
        }
        if rhs.len() != rows {
            return Err(SolverError::InvalidSystem(format!(
                "right-hand side has {} entries, matrix has {} rows",
                rhs.len(),
                rows
            )));
        }
        Ok(Self { matrix, rhs })
    }

    /// Number of unknowns.
    pub fn dimension(&self) -> usize {
        self.rhs.len()
    }

    /// Coefficients in row-major order, borrowed when already contiguous.
    pub fn flat_coefficients(&self) -> Cow<'_, [f64]> {
        match self.matrix.as_slice() {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(self.matrix.iter().copied().collect()),
        }
    }

    /// Right-hand side as a contiguous slice.
    pub fn flat_rhs(&self) -> Cow<'_, [f64]> {
        match self.rhs.as_slice() {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(self.rhs.to_vec()),
        }
    }
}

/// The fully reduced system collected at the coordinator.
///
/// Rows are in the order the workers held them, not in column order: row
/// `r` is the pivot for whichever column holds its single `1.0` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedSystem {
    pub matrix: Array2<f64>,
    pub rhs: Array1<f64>,
}

impl ReducedSystem {
    pub fn dimension(&self) -> usize {
        self.rhs.len()
    }

    /// For each column, the index of the row that was reduced onto it.
    ///
    /// A row qualifies for column `c` when its entry at `c` is exactly `1.0`
    /// and every other entry is exactly `0.0`. Each column must have exactly
    /// one qualifying row.
    pub fn pivot_rows(&self) -> Result<Vec<usize>, SolverError> {
        let n = self.dimension();
        let mut owners: Vec<Option<usize>> = vec![None; n];

        for (r, row) in self.matrix.axis_iter(Axis(0)).enumerate() {
            let mut nonzero = row.iter().enumerate().filter(|&(_, &v)| v != 0.0);
            let column = match (nonzero.next(), nonzero.next()) {
                (Some((c, &v)), None) if v == 1.0 => c,
                _ => continue,
            };
            if let Some(previous) = owners[column] {
                return Err(SolverError::Recovery(format!(
                    "rows {} and {} both reduce onto column {}",
                    previous, r, column
                )));
            }
            owners[column] = Some(r);
        }

        owners
            .into_iter()
            .enumerate()
            .map(|(c, owner)| {
                owner.ok_or_else(|| {
                    SolverError::Recovery(format!("no reduced row for column {}", c))
                })
            })
            .collect()
    }

    /// Recover the solution vector in original column order.
    pub fn solution(&self) -> Result<Array1<f64>, SolverError> {
        let rows = self.pivot_rows()?;
        Ok(rows.iter().map(|&r| self.rhs[r]).collect())
    }

    /// Return a copy with rows permuted into column order.
    ///
    /// The result's matrix is the identity and its right-hand side is the
    /// solution.
    pub fn reorder(&self) -> Result<ReducedSystem, SolverError> {
        let rows = self.pivot_rows()?;
        Ok(ReducedSystem {
            matrix: self.matrix.select(Axis(0), &rows),
            rhs: rows.iter().map(|&r| self.rhs[r]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_new_rejects_non_square() {
        let err = AugmentedSystem::new(Array2::zeros((2, 3)), Array1::zeros(2)).unwrap_err();
        assert!(matches!(err, SolverError::InvalidSystem(_)));

        let err = AugmentedSystem::new(Array2::zeros((2, 2)), Array1::zeros(3)).unwrap_err();
        assert!(matches!(err, SolverError::InvalidSystem(_)));
    }

    #[test]
    fn test_flat_coefficients_follow_logical_order() {
        let system = AugmentedSystem::new(array![[1.0, 2.0], [3.0, 4.0]], array![5.0, 6.0]).unwrap();
        assert!(matches!(system.flat_coefficients(), Cow::Borrowed(_)));

        // Column-major storage is not a contiguous row-major slice.
        let view = AugmentedSystem {
            matrix: system.matrix.clone().reversed_axes(),
            rhs: system.rhs.clone(),
        };
        assert_eq!(&*view.flat_coefficients(), &[1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_permutation_recovery() {
        let reduced = ReducedSystem {
            matrix: array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            rhs: array![-1.0, 2.0, 3.0],
        };
        assert_eq!(reduced.pivot_rows().unwrap(), vec![1, 2, 0]);
        assert_eq!(reduced.solution().unwrap(), array![2.0, 3.0, -1.0]);

        let ordered = reduced.reorder().unwrap();
        assert_eq!(ordered.matrix, Array2::<f64>::eye(3));
        assert_eq!(ordered.rhs, array![2.0, 3.0, -1.0]);
    }

    #[test]
    fn test_recovery_rejects_unreduced_rows() {
        let reduced = ReducedSystem {
            matrix: array![[1.0, 0.5], [0.0, 1.0]],
            rhs: array![1.0, 1.0],
        };
        assert!(matches!(reduced.solution(), Err(SolverError::Recovery(_))));

        let duplicated = ReducedSystem {
            matrix: array![[1.0, 0.0], [1.0, 0.0]],
            rhs: array![1.0, 1.0],
        };
        assert!(matches!(duplicated.pivot_rows(), Err(SolverError::Recovery(_))));
    }
}
