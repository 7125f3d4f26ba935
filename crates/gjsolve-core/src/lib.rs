//! # gjsolve Core
//!
//! Distributed direct solver for dense linear systems
//! $\mathbf{A}\mathbf{x} = \mathbf{b}$ by Gauss-Jordan elimination with
//! partial pivoting, executed cooperatively by a fixed group of workers.
//!
//! ## Architecture
//!
//! Workers talk only through the collective operations of a
//! [`gjsolve_comm::Communicator`]. The coordinator (worker 0) distributes
//! contiguous row blocks, every worker takes part in $n$ forward and $n$
//! reverse elimination rounds, and the reduced rows are collected back at
//! the coordinator, which recovers the solution from the row permutation.
//!
//! ## Modules
//!
//! - [`types`]: Input and collected systems, permutation recovery.
//! - [`partition`]: Balanced contiguous row partitioning.
//! - [`rows`]: Per-worker row blocks and pivot-round markers.
//! - [`solver`]: Solver trait, distributed and sequential Gauss-Jordan.
//! - [`source`]: Random and file-based system construction.
//! - [`verify`]: Residual check of a computed solution.

pub mod partition;
pub mod rows;
pub mod solver;
pub mod source;
pub mod types;
pub mod verify;
