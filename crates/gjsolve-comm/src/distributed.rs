//! MPI communicator for running workers as separate processes.
//!
//! Each MPI rank is one worker. Launch with e.g.
//! `mpiexec -n 4 gjsolve run job.toml`. The world communicator is used for
//! every collective; the MPI environment is finalized when the
//! [`MpiComm`] is dropped.
//!
//! Gated behind the `mpi` feature flag.

use mpi::datatype::{Partition, PartitionMut};
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Count;

use crate::communicator::{check_layout, CommError, CommInfo, CommKind};

/// Communicator backed by `MPI_COMM_WORLD`.
pub struct MpiComm {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
    // Must outlive `world`; dropping it finalizes MPI.
    _universe: Universe,
}

impl MpiComm {
    /// Initialize MPI and attach to the world communicator.
    pub fn new() -> Result<Self, CommError> {
        let universe = mpi::initialize().ok_or_else(|| {
            CommError::Unavailable("MPI already initialized or failed to start".into())
        })?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        log::debug!("MPI rank {} of {} attached to world", rank, size);
        Ok(Self {
            world,
            rank,
            size,
            _universe: universe,
        })
    }
}

fn to_counts(values: &[usize]) -> Result<Vec<Count>, CommError> {
    values
        .iter()
        .map(|&v| {
            Count::try_from(v).map_err(|_| {
                CommError::InvalidArgument(format!("{} exceeds the MPI count range", v))
            })
        })
        .collect()
}

impl crate::Communicator for MpiComm {
    fn info(&self) -> CommInfo {
        CommInfo {
            name: format!("MPI world ({} ranks)", self.size),
            kind: CommKind::Mpi,
            rank: self.rank,
            size: self.size,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.world.barrier();
        Ok(())
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<(), CommError> {
        if root >= self.size {
            return Err(CommError::InvalidArgument(format!(
                "broadcast root {} out of range",
                root
            )));
        }
        self.world.process_at_rank(root as i32).broadcast_into(buf);
        Ok(())
    }

    fn all_gather_f64(&self, value: f64) -> Result<Vec<f64>, CommError> {
        let mut out = vec![0.0_f64; self.size];
        self.world.all_gather_into(&value, &mut out[..]);
        Ok(out)
    }

    fn all_gather_u64(&self, values: &[u64]) -> Result<Vec<u64>, CommError> {
        let mut out = vec![0_u64; values.len() * self.size];
        self.world.all_gather_into(values, &mut out[..]);
        Ok(out)
    }

    fn scatter_varcount(
        &self,
        send: Option<&[f64]>,
        counts: &[usize],
        displs: &[usize],
        recv: &mut [f64],
        root: usize,
    ) -> Result<(), CommError> {
        check_layout(counts, displs, self.size, root)?;
        let root_process = self.world.process_at_rank(root as i32);
        if self.rank == root {
            let send = send.ok_or_else(|| {
                CommError::InvalidArgument("scatter root has no send buffer".into())
            })?;
            let partition = Partition::new(send, to_counts(counts)?, to_counts(displs)?);
            root_process.scatter_varcount_into_root(&partition, recv);
        } else {
            root_process.scatter_varcount_into(recv);
        }
        Ok(())
    }

    fn gather_varcount(
        &self,
        send: &[f64],
        recv: Option<&mut [f64]>,
        counts: &[usize],
        displs: &[usize],
        root: usize,
    ) -> Result<(), CommError> {
        check_layout(counts, displs, self.size, root)?;
        let root_process = self.world.process_at_rank(root as i32);
        if self.rank == root {
            let recv = recv.ok_or_else(|| {
                CommError::InvalidArgument("gather root has no receive buffer".into())
            })?;
            let mut partition = PartitionMut::new(recv, to_counts(counts)?, to_counts(displs)?);
            root_process.gather_varcount_into_root(send, &mut partition);
        } else {
            root_process.gather_varcount_into(send);
        }
        Ok(())
    }
}
