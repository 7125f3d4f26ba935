//! Row distribution from, and collection back to, the coordinator.
//!
//! Both directions use the same block boundaries from the
//! [`RowPartition`](crate::partition::RowPartition): one variable-count
//! transfer for the row-major coefficients (`rows * n` elements per worker)
//! and a second for the right-hand-side entries (`rows` per worker).

use gjsolve_comm::Communicator;
use ndarray::{Array1, Array2};

use crate::solver::SolverError;
use crate::types::{AugmentedSystem, ReducedSystem};

use super::context::WorkerContext;
use super::COORDINATOR;

impl<'c, C: Communicator + ?Sized> WorkerContext<'c, C> {
    /// Scatter the coordinator's system so that each worker holds its block.
    ///
    /// `system` is only read on the coordinator.
    pub fn distribute(&mut self, system: Option<&AugmentedSystem>) -> Result<(), SolverError> {
        let n = self.partition.dimension();
        let system = system.filter(|_| self.rank == COORDINATOR);
        let coefficients = system.map(|s| s.flat_coefficients());
        let rhs = system.map(|s| s.flat_rhs());

        self.comm.scatter_varcount(
            coefficients.as_deref(),
            &self.partition.element_counts(n),
            &self.partition.element_offsets(n),
            self.rows.coefficients_mut(),
            COORDINATOR,
        )?;
        self.comm.scatter_varcount(
            rhs.as_deref(),
            self.partition.counts(),
            self.partition.offsets(),
            self.rows.rhs_values_mut(),
            COORDINATOR,
        )?;
        Ok(())
    }

    /// Gather every worker's block back to the coordinator.
    ///
    /// Returns the collected system on the coordinator and `None` elsewhere.
    /// Rows land at their original scatter offsets.
    pub fn collect(&self) -> Result<Option<ReducedSystem>, SolverError> {
        let n = self.partition.dimension();
        let is_coordinator = self.rank == COORDINATOR;

        let mut matrix = if is_coordinator { vec![0.0; n * n] } else { Vec::new() };
        let mut rhs = if is_coordinator { vec![0.0; n] } else { Vec::new() };

        self.comm.gather_varcount(
            self.rows.coefficients(),
            is_coordinator.then_some(matrix.as_mut_slice()),
            &self.partition.element_counts(n),
            &self.partition.element_offsets(n),
            COORDINATOR,
        )?;
        self.comm.gather_varcount(
            self.rows.rhs_values(),
            is_coordinator.then_some(rhs.as_mut_slice()),
            self.partition.counts(),
            self.partition.offsets(),
            COORDINATOR,
        )?;

        if !is_coordinator {
            return Ok(None);
        }
        let matrix = Array2::from_shape_vec((n, n), matrix)
            .map_err(|e| SolverError::InvalidSystem(e.to_string()))?;
        Ok(Some(ReducedSystem {
            matrix,
            rhs: Array1::from_vec(rhs),
        }))
    }
}
