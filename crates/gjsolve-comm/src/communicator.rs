//! Communicator trait and worker-group abstraction.
//!
//! The [`Communicator`] trait abstracts over how cooperating workers exchange
//! data (threads sharing one address space, or MPI ranks) so that the
//! elimination code in `gjsolve-core` remains transport-agnostic.

use thiserror::Error;

/// Errors originating from a communicator.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("Worker group aborted: a member left before the collective completed")]
    Aborted,

    #[error("Collective order violated: worker {rank} called {found} while peers called {expected}")]
    OutOfOrder {
        rank: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Communicator not available: {0}")]
    Unavailable(String),
}

/// Describes a communicator as seen from one member.
#[derive(Debug, Clone)]
pub struct CommInfo {
    pub name: String,
    pub kind: CommKind,
    pub rank: usize,
    pub size: usize,
}

/// The transport behind a communicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommKind {
    Threads,
    Mpi,
}

/// Abstraction over a fixed group of cooperating workers.
///
/// All methods are collective. Every member must invoke them in identical
/// program order; skipping one on any member stalls (or, for transports that
/// can detect it, fails) the whole group.
///
/// Variable-count operations take `counts` and `displs` in elements, indexed
/// by rank, exactly like `MPI_Scatterv` / `MPI_Gatherv`.
pub trait Communicator {
    /// Return information about this member and its group.
    fn info(&self) -> CommInfo;

    /// Index of this member within the group (0-based).
    fn rank(&self) -> usize;

    /// Number of members in the group.
    fn size(&self) -> usize;

    /// Block until every member has reached the barrier.
    fn barrier(&self) -> Result<(), CommError>;

    /// Copy `buf` from `root` into `buf` on every other member.
    ///
    /// All members must pass buffers of the same length.
    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<(), CommError>;

    /// Gather one value from every member onto every member, indexed by rank.
    fn all_gather_f64(&self, value: f64) -> Result<Vec<f64>, CommError>;

    /// Gather a fixed-length slice from every member onto every member.
    ///
    /// The result is the concatenation of all contributions in rank order.
    /// All members must contribute slices of the same length.
    fn all_gather_u64(&self, values: &[u64]) -> Result<Vec<u64>, CommError>;

    /// Scatter variable-sized segments of `send` (significant only at `root`)
    /// into each member's `recv`.
    fn scatter_varcount(
        &self,
        send: Option<&[f64]>,
        counts: &[usize],
        displs: &[usize],
        recv: &mut [f64],
        root: usize,
    ) -> Result<(), CommError>;

    /// Gather each member's `send` into `recv` at `root` (significant only at
    /// `root`), placing rank `r`'s data at `displs[r]`.
    fn gather_varcount(
        &self,
        send: &[f64],
        recv: Option<&mut [f64]>,
        counts: &[usize],
        displs: &[usize],
        root: usize,
    ) -> Result<(), CommError>;
}

/// Check that a `counts`/`displs` layout is usable for a group of `size`.
pub(crate) fn check_layout(
    counts: &[usize],
    displs: &[usize],
    size: usize,
    root: usize,
) -> Result<(), CommError> {
    if root >= size {
        return Err(CommError::InvalidArgument(format!(
            "root {} out of range for group of {}",
            root, size
        )));
    }
    if counts.len() != size || displs.len() != size {
        return Err(CommError::InvalidArgument(format!(
            "expected {} counts and displacements, got {} and {}",
            size,
            counts.len(),
            displs.len()
        )));
    }
    Ok(())
}
