//! Per-worker solve context.
//!
//! A [`WorkerContext`] is created once per worker at the start of a solve and
//! carries everything the rounds need: the communicator, the worker's
//! identity, the row partition, its row block, and the pivot buffer. Nothing
//! about a worker lives in global state.

use gjsolve_comm::Communicator;

use crate::partition::RowPartition;
use crate::rows::LocalRowSet;
use crate::solver::SolverError;
use crate::types::AugmentedSystem;

use super::elimination::{eliminate_forward, eliminate_reverse, normalize_pivot, release_pivot};
use super::pivot::{agree, forward_candidate, reverse_candidate};
use super::{Pass, COORDINATOR};

/// Fields exchanged by the initial agreement check, per worker.
const CHECK_WIDTH: usize = 6;

/// State held by one worker for the duration of a solve.
pub struct WorkerContext<'c, C: Communicator + ?Sized> {
    pub(super) comm: &'c C,
    pub(super) rank: usize,
    pub(super) partition: RowPartition,
    pub(super) rows: LocalRowSet,
    pub(super) pivot_tolerance: f64,
    pivot_buffer: Vec<f64>,
}

impl<'c, C: Communicator + ?Sized> WorkerContext<'c, C> {
    /// Validate the solve parameters across all workers and allocate this
    /// worker's row block.
    ///
    /// Every worker contributes its dimension, the worker count it expects,
    /// the actual group size, whether its allocation succeeded, (for the
    /// coordinator) whether it holds a matching system, and its pivot
    /// tolerance. Negative or NaN tolerances are treated as zero. All workers evaluate
    /// the same gathered values, so they either all proceed or all fail with
    /// the same error before any data is transferred.
    pub fn establish(
        comm: &'c C,
        dimension: usize,
        expected_workers: Option<usize>,
        pivot_tolerance: f64,
        system: Option<&AugmentedSystem>,
    ) -> Result<Self, SolverError> {
        let rank = comm.rank();
        let size = comm.size();
        let pivot_tolerance = if pivot_tolerance > 0.0 { pivot_tolerance } else { 0.0 };
        let partition = RowPartition::new(dimension, size);
        let allocation = LocalRowSet::allocate(dimension, partition.rows(rank), partition.offset(rank));

        let has_system = if rank == COORDINATOR {
            system.map_or(false, |s| s.dimension() == dimension)
        } else {
            true
        };
        let local = [
            dimension as u64,
            expected_workers.unwrap_or(size) as u64,
            size as u64,
            allocation.is_ok() as u64,
            has_system as u64,
            pivot_tolerance.to_bits(),
        ];
        let gathered = comm.all_gather_u64(&local)?;
        if let Err(e) = check_agreement(&gathered, &partition) {
            log::warn!("worker {}: agreement check failed: {}", rank, e);
            return Err(e);
        }

        let rows = allocation?;
        log::debug!(
            "worker {}/{}: rows {}..{} of {}",
            rank,
            size,
            rows.first_row(),
            rows.first_row() + rows.len(),
            dimension
        );

        Ok(Self {
            comm,
            rank,
            partition,
            rows,
            pivot_tolerance,
            pivot_buffer: vec![0.0; dimension + 1],
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn rows(&self) -> &LocalRowSet {
        &self.rows
    }

    /// Run one elimination round for `column`.
    ///
    /// Every worker must call this for the same `(pass, column)` sequence.
    pub fn run_round(&mut self, pass: Pass, column: usize) -> Result<(), SolverError> {
        match pass {
            Pass::Forward => self.forward_round(column),
            Pass::Reverse => self.reverse_round(column),
        }
    }

    fn forward_round(&mut self, column: usize) -> Result<(), SolverError> {
        let local = forward_candidate(&self.rows, column);
        let choice = agree(self.comm, local.value)?;
        // Also rejects NaN.
        if !(choice.value > self.pivot_tolerance) {
            return Err(SolverError::SingularColumn {
                column,
                magnitude: choice.value,
            });
        }
        log::trace!(
            "forward {}: pivot |{:.3e}| on worker {}",
            column,
            choice.value,
            choice.owner
        );

        if choice.owner == self.rank {
            if let Some(j) = local.row {
                normalize_pivot(&mut self.rows, j, column, &mut self.pivot_buffer);
            }
        }
        self.comm.broadcast(&mut self.pivot_buffer, choice.owner)?;
        eliminate_forward(&mut self.rows, &self.pivot_buffer, column);
        Ok(())
    }

    fn reverse_round(&mut self, column: usize) -> Result<(), SolverError> {
        let local = reverse_candidate(&self.rows);
        let choice = agree(self.comm, local.value)?;
        if choice.value != column as f64 {
            return Err(SolverError::PivotOrder {
                column,
                round: choice.value,
            });
        }
        log::trace!("reverse {}: pivot row on worker {}", column, choice.owner);

        let mut pivot_rhs = [0.0];
        if choice.owner == self.rank {
            if let Some(j) = local.row {
                pivot_rhs[0] = release_pivot(&mut self.rows, j);
            }
        }
        self.comm.broadcast(&mut pivot_rhs, choice.owner)?;
        eliminate_reverse(&mut self.rows, pivot_rhs[0], column);
        Ok(())
    }
}

/// Evaluate the gathered agreement values. Deterministic in `gathered`, so
/// every worker reaches the same verdict.
fn check_agreement(gathered: &[u64], partition: &RowPartition) -> Result<(), SolverError> {
    let workers: Vec<&[u64]> = gathered.chunks(CHECK_WIDTH).collect();
    let Some(first) = workers.first() else {
        return Err(SolverError::ArgumentMismatch("no workers took part in the agreement".into()));
    };

    for (r, w) in workers.iter().enumerate() {
        if w[0] != first[0] {
            return Err(SolverError::ArgumentMismatch(format!(
                "worker {} has dimension {}, worker 0 has {}",
                r, w[0], first[0]
            )));
        }
        if w[1] != w[2] {
            return Err(SolverError::ArgumentMismatch(format!(
                "worker {} expects {} workers, group has {}",
                r, w[1], w[2]
            )));
        }
        if w[5] != first[5] {
            return Err(SolverError::ArgumentMismatch(format!(
                "worker {} has pivot tolerance {:e}, worker 0 has {:e}",
                r,
                f64::from_bits(w[5]),
                f64::from_bits(first[5])
            )));
        }
    }

    let dimension = first[0] as usize;
    if dimension == 0 {
        return Err(SolverError::InvalidSystem("system dimension must be at least 1".into()));
    }
    if first[4] == 0 {
        return Err(SolverError::ArgumentMismatch(format!(
            "coordinator holds no system of dimension {}",
            dimension
        )));
    }
    if let Some(r) = workers.iter().position(|w| w[3] == 0) {
        return Err(SolverError::Allocation {
            rows: partition.rows(r),
            dimension,
        });
    }
    Ok(())
}
