//! Residual check of a computed solution against the original system.

use ndarray::Array1;
use serde::Serialize;

use crate::types::AugmentedSystem;

/// Largest absolute residual $|(\mathbf{A}\mathbf{x})_i - b_i|$ and the
/// row where it occurs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Residual {
    pub max_delta: f64,
    pub row: usize,
}

/// Evaluate $\mathbf{A}\mathbf{x} - \mathbf{b}$ and report its largest entry.
///
/// # Panics
/// If `x` does not have one entry per unknown.
pub fn residual(system: &AugmentedSystem, x: &Array1<f64>) -> Residual {
    assert_eq!(x.len(), system.dimension(), "Solution length must match system dimension");

    let ax = system.matrix.dot(x);
    ax.iter()
        .zip(system.rhs.iter())
        .map(|(l, r)| (l - r).abs())
        .enumerate()
        .fold(
            Residual {
                max_delta: 0.0,
                row: 0,
            },
            |best, (row, delta)| {
                if best.max_delta < delta {
                    Residual {
                        max_delta: delta,
                        row,
                    }
                } else {
                    best
                }
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_exact_solution_has_zero_residual() {
        let system = AugmentedSystem::new(array![[2.0, 0.0], [0.0, 4.0]], array![2.0, 8.0]).unwrap();
        let r = residual(&system, &array![1.0, 2.0]);
        assert_eq!(r.max_delta, 0.0);
    }

    #[test]
    fn test_reports_worst_row() {
        let system = AugmentedSystem::new(
            array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            array![1.0, 2.0, 3.0],
        )
        .unwrap();
        let r = residual(&system, &array![1.1, 2.0, 2.5]);
        assert_eq!(r.row, 2);
        assert_relative_eq!(r.max_delta, 0.5, epsilon = 1e-12);
    }
}
