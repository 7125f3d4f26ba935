//! Distributed Gauss-Jordan elimination.
//!
//! The augmented system is split into contiguous row blocks, one per worker.
//! Elimination then runs as a fixed sequence of collective rounds:
//!
//! 1. **Forward pass**, columns $0..n-1$: agree on the row with the largest
//!    $|a_{ji}|$ among rows not yet used as a pivot, normalize and broadcast
//!    it, and eliminate column $i$ from every unused row.
//! 2. Barrier.
//! 3. **Reverse pass**, columns $n-1..0$: agree on the row that was pivot
//!    for the latest remaining round, broadcast its right-hand side, and
//!    back-substitute it into every row still awaiting its reverse round.
//! 4. Collect the blocks at the coordinator.
//!
//! Exactly $n$ rounds run in each pass regardless of the matrix contents.
//! Any error raised after the initial agreement check derives from values
//! every worker agreed on, so all workers stop at the same point.

pub mod context;
pub mod distribution;
pub mod elimination;
pub mod pivot;

use std::time::Instant;

use gjsolve_comm::{CommError, Communicator, LocalComm};

use super::{LinearSolver, SolverError};
use crate::types::{AugmentedSystem, ReducedSystem};

pub use context::WorkerContext;

/// Rank of the worker that holds the full system before distribution and
/// after collection.
pub const COORDINATOR: usize = 0;

/// Direction of an elimination round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Forward,
    Reverse,
}

/// The distributed solver, holding configuration for the method.
#[derive(Debug, Clone)]
pub struct DistributedSolver {
    /// Pivot magnitudes at or below this value are treated as zero.
    pub pivot_tolerance: f64,
    /// Worker count every worker expects; checked against the group size.
    pub expected_workers: Option<usize>,
    /// Number of local threads used when solving through [`LinearSolver`].
    pub local_workers: usize,
}

impl Default for DistributedSolver {
    fn default() -> Self {
        Self {
            pivot_tolerance: 0.0,
            expected_workers: None,
            local_workers: 1,
        }
    }
}

impl DistributedSolver {
    pub fn new(local_workers: usize) -> Self {
        Self {
            local_workers,
            ..Default::default()
        }
    }

    /// Run the full solve as one worker of `comm`'s group.
    ///
    /// Every worker calls this with the same `dimension`; only the
    /// coordinator's `system` is used. Returns the collected system on the
    /// coordinator and `None` on every other worker.
    pub fn solve_worker<C: Communicator + ?Sized>(
        &self,
        comm: &C,
        dimension: usize,
        system: Option<&AugmentedSystem>,
    ) -> Result<Option<ReducedSystem>, SolverError> {
        let start = Instant::now();
        let mut ctx = WorkerContext::establish(
            comm,
            dimension,
            self.expected_workers,
            self.pivot_tolerance,
            system,
        )?;

        ctx.distribute(system)?;
        for column in 0..dimension {
            ctx.run_round(Pass::Forward, column)?;
        }
        log::debug!("worker {}: forward pass complete", ctx.rank());

        comm.barrier()?;

        for column in (0..dimension).rev() {
            ctx.run_round(Pass::Reverse, column)?;
        }
        log::debug!("worker {}: reverse pass complete", ctx.rank());

        let collected = ctx.collect()?;
        if collected.is_some() {
            log::info!(
                "reduced {}x{} system on {} workers in {:.3?}",
                dimension,
                dimension,
                comm.size(),
                start.elapsed()
            );
        }
        Ok(collected)
    }
}

impl LinearSolver for DistributedSolver {
    /// Solve on `local_workers` threads connected by a [`LocalComm`] group.
    fn reduce(&self, system: &AugmentedSystem) -> Result<ReducedSystem, SolverError> {
        let group = LocalComm::group(self.local_workers)?;
        let dimension = system.dimension();

        let results: Vec<Result<Option<ReducedSystem>, SolverError>> = std::thread::scope(|s| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let local = (comm.rank() == COORDINATOR).then_some(system);
                        self.solve_worker(&comm, dimension, local)
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, h)| {
                    h.join().unwrap_or_else(|_| {
                        Err(SolverError::WorkerFailure(format!("worker {} panicked", rank)))
                    })
                })
                .collect()
        });

        // Report the coordinator's outcome; when it failed only because a
        // peer aborted the group, surface the peer's own error instead.
        let mut results = results.into_iter();
        match results.next() {
            Some(Ok(Some(reduced))) => Ok(reduced),
            Some(Err(SolverError::Comm(CommError::Aborted))) => Err(results
                .filter_map(Result::err)
                .find(|e| !matches!(e, SolverError::Comm(CommError::Aborted)))
                .unwrap_or(SolverError::Comm(CommError::Aborted))),
            Some(Err(e)) => Err(e),
            Some(Ok(None)) | None => Err(SolverError::WorkerFailure(
                "coordinator returned no result".into(),
            )),
        }
    }

    fn method_name(&self) -> &str {
        "Distributed Gauss-Jordan"
    }
}
