//! # gjsolve Comm
//!
//! Collective communication layer for the gjsolve distributed solver. This
//! crate provides a [`Communicator`](communicator::Communicator) trait that
//! isolates the elimination engine from how its workers are connected.
//!
//! ## Available communicators
//!
//! | Communicator | Feature flag | Transport |
//! |--------------|-------------|-----------|
//! | [`LocalComm`] | (always) | Threads in one process |
//! | `MpiComm` | `mpi` | MPI world communicator |
//!
//! Every operation on a communicator is a *collective*: all members must call
//! the same operations in the same order, or the group fails.

pub mod communicator;
pub mod local;

#[cfg(feature = "mpi")]
pub mod distributed;

pub use communicator::{CommError, CommInfo, CommKind, Communicator};
pub use local::LocalComm;

#[cfg(feature = "mpi")]
pub use distributed::MpiComm;
