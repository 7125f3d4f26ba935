//! Classical single-threaded Gauss-Jordan elimination.
//!
//! Same pivoting rule and the same floating-point operations, in the same
//! order, as the distributed solver on a single worker, so the two agree
//! bit-for-bit. Useful as a reference and for small systems.

use ndarray::Axis;

use super::{LinearSolver, SolverError};
use crate::types::{AugmentedSystem, ReducedSystem};

/// Sequential Gauss-Jordan with partial pivoting.
#[derive(Debug, Clone, Default)]
pub struct SequentialSolver {
    /// Pivot magnitudes at or below this value are treated as zero.
    pub pivot_tolerance: f64,
}

impl LinearSolver for SequentialSolver {
    fn reduce(&self, system: &AugmentedSystem) -> Result<ReducedSystem, SolverError> {
        gauss_jordan(system, self.pivot_tolerance)
    }

    fn method_name(&self) -> &str {
        "Sequential Gauss-Jordan"
    }
}

/// Reduce `system` completely. Rows stay in their input order.
pub fn gauss_jordan(system: &AugmentedSystem, pivot_tolerance: f64) -> Result<ReducedSystem, SolverError> {
    let n = system.dimension();
    if n == 0 {
        return Err(SolverError::InvalidSystem("system dimension must be at least 1".into()));
    }
    let mut a = system.matrix.as_standard_layout().into_owned();
    let mut b = system.rhs.to_owned();
    let mut rounds: Vec<Option<usize>> = vec![None; n];
    let mut pivot_order = Vec::with_capacity(n);

    for i in 0..n {
        let mut max = 0.0;
        let mut pivot = None;
        for j in 0..n {
            if rounds[j].is_none() && max < a[[j, i]].abs() {
                max = a[[j, i]].abs();
                pivot = Some(j);
            }
        }
        let p = match pivot {
            Some(p) if max > pivot_tolerance => p,
            _ => {
                return Err(SolverError::SingularColumn {
                    column: i,
                    magnitude: max,
                })
            }
        };

        let div = a[[p, i]];
        a.row_mut(p).mapv_inplace(|v| v / div);
        b[p] /= div;
        rounds[p] = Some(i);
        pivot_order.push(p);

        let pivot_row = a.row(p).to_owned();
        let pivot_rhs = b[p];
        for (j, mut row) in a.axis_iter_mut(Axis(0)).enumerate() {
            if rounds[j].is_some() {
                continue;
            }
            let mult = row[i];
            for (v, &q) in row.iter_mut().zip(pivot_row.iter()) {
                *v -= mult * q;
            }
            b[j] -= mult * pivot_rhs;
        }
    }

    for i in (0..n).rev() {
        let p = pivot_order[i];
        rounds[p] = None;
        let pivot_rhs = b[p];
        for j in 0..n {
            if rounds[j].is_none() {
                continue;
            }
            let mult = a[[j, i]];
            a[[j, i]] = 0.0;
            b[j] -= mult * pivot_rhs;
        }
    }

    Ok(ReducedSystem { matrix: a, rhs: b })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_solve_textbook_system() {
        let system = AugmentedSystem::new(
            array![[2.0, 1.0, -1.0], [-3.0, -1.0, 2.0], [-2.0, 1.0, 2.0]],
            array![8.0, -11.0, -3.0],
        )
        .unwrap();

        let reduced = SequentialSolver::default().reduce(&system).unwrap();
        let x = reduced.solution().unwrap();
        assert_abs_diff_eq!(x[0], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[1], 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[2], -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rows_stay_in_input_order() {
        // Largest pivot for column 0 is row 1, so row 1 reduces onto column 0.
        let system = AugmentedSystem::new(array![[1.0, 2.0], [4.0, 1.0]], array![5.0, 6.0]).unwrap();
        let reduced = gauss_jordan(&system, 0.0).unwrap();
        assert_eq!(reduced.pivot_rows().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_zero_row_is_singular() {
        let system = AugmentedSystem::new(
            array![[1.0, 2.0, 3.0], [0.0, 0.0, 0.0], [4.0, 5.0, 7.0]],
            array![1.0, 0.0, 2.0],
        )
        .unwrap();
        let err = gauss_jordan(&system, 0.0).unwrap_err();
        assert!(matches!(err, SolverError::SingularColumn { column: 2, .. }));
    }

    #[test]
    fn test_tolerance_rejects_tiny_pivot() {
        let system = AugmentedSystem::new(array![[1e-14, 0.0], [0.0, 1.0]], array![1.0, 1.0]).unwrap();
        assert!(gauss_jordan(&system, 0.0).is_ok());
        assert!(matches!(
            gauss_jordan(&system, 1e-12),
            Err(SolverError::SingularColumn { column: 0, .. })
        ));
    }
}
