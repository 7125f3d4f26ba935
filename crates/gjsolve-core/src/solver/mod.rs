//! Linear solver abstraction and implementations.
//!
//! The [`LinearSolver`] trait is the coordinator-facing interface: a whole
//! [`AugmentedSystem`] goes in, a [`ReducedSystem`] comes out. Two
//! implementations exist:
//!
//! - [`gauss_jordan::DistributedSolver`]: the distributed Gauss-Jordan
//!   engine. Through the trait it runs a worker group on local threads; MPI
//!   ranks call [`gauss_jordan::DistributedSolver::solve_worker`] directly.
//! - [`sequential::SequentialSolver`]: classical single-threaded
//!   Gauss-Jordan with partial pivoting, used as a reference.

pub mod gauss_jordan;
pub mod sequential;

use gjsolve_comm::CommError;
use thiserror::Error;

use crate::types::{AugmentedSystem, ReducedSystem};

/// Errors that can occur during a solve.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Singular or near-singular system: no usable pivot for column {column} (largest magnitude {magnitude:.3e})")]
    SingularColumn { column: usize, magnitude: f64 },

    #[error("Argument mismatch across workers: {0}")]
    ArgumentMismatch(String),

    #[error("Allocation failure: cannot hold {rows} rows of dimension {dimension}")]
    Allocation { rows: usize, dimension: usize },

    #[error("Reverse pass expected the pivot of round {column}, agreement returned {round}")]
    PivotOrder { column: usize, round: f64 },

    #[error("Permutation recovery failed: {0}")]
    Recovery(String),

    #[error("Invalid system: {0}")]
    InvalidSystem(String),

    #[error("Worker failure: {0}")]
    WorkerFailure(String),

    #[error("Communication error: {0}")]
    Comm(#[from] CommError),
}

/// A direct solver driven from the coordinator.
pub trait LinearSolver {
    /// Reduce `system` completely. Rows of the result may be permuted; use
    /// [`ReducedSystem::solution`] to recover $\mathbf{x}$.
    fn reduce(&self, system: &AugmentedSystem) -> Result<ReducedSystem, SolverError>;

    /// Human-readable name of the method.
    fn method_name(&self) -> &str;
}
