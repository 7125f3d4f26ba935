//! Distributed pivot selection.
//!
//! Each round every worker proposes a local candidate, then all workers agree
//! on the global maximum and its owner. The agreement is an all-gather of one
//! value per worker followed by the same deterministic fold on every worker,
//! so the winner is identical everywhere without relying on a library
//! MAXLOC and its unspecified tie handling.

use std::cmp::Ordering;

use gjsolve_comm::{CommError, Communicator};

use crate::rows::LocalRowSet;
use crate::solver::SolverError;

/// Value contributed to a reverse-round agreement by a worker with no
/// assigned rows left.
pub const NO_ROUND: f64 = -1.0;

/// A worker's proposal for the current round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalCandidate {
    /// Pivot magnitude (forward) or round number (reverse).
    pub value: f64,
    /// Local index of the proposed row, if the worker has one.
    pub row: Option<usize>,
}

/// The globally agreed pivot: its value and the worker that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotChoice {
    pub value: f64,
    pub owner: usize,
}

impl PivotChoice {
    /// Whether `self` should be chosen over `other`.
    ///
    /// Larger values win; exact ties go to the lower-numbered worker; NaN
    /// never beats a number.
    pub fn beats(&self, other: &PivotChoice) -> bool {
        match self.value.partial_cmp(&other.value) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Less) => false,
            Some(Ordering::Equal) => self.owner < other.owner,
            None => other.value.is_nan() && !self.value.is_nan(),
        }
    }

    /// Fold per-worker values (indexed by worker) into the winning choice.
    pub fn reduce(values: &[f64]) -> Option<PivotChoice> {
        values
            .iter()
            .enumerate()
            .map(|(owner, &value)| PivotChoice { value, owner })
            .reduce(|best, next| if next.beats(&best) { next } else { best })
    }
}

/// Largest |a[j][column]| over this worker's unassigned rows.
///
/// Starts from zero with a strict comparison, so the first row wins local
/// ties and a row is only proposed for a nonzero magnitude.
pub fn forward_candidate(rows: &LocalRowSet, column: usize) -> LocalCandidate {
    let mut best = LocalCandidate {
        value: 0.0,
        row: None,
    };
    for j in 0..rows.len() {
        if rows.marker(j).is_assigned() {
            continue;
        }
        let magnitude = rows.row(j)[column].abs();
        if best.value < magnitude {
            best = LocalCandidate {
                value: magnitude,
                row: Some(j),
            };
        }
    }
    best
}

/// This worker's assigned row with the latest pivot round.
pub fn reverse_candidate(rows: &LocalRowSet) -> LocalCandidate {
    rows.markers()
        .iter()
        .enumerate()
        .filter_map(|(j, m)| m.round().map(|round| (j, round)))
        .max_by_key(|&(_, round)| round)
        .map(|(j, round)| LocalCandidate {
            value: round as f64,
            row: Some(j),
        })
        .unwrap_or(LocalCandidate {
            value: NO_ROUND,
            row: None,
        })
}

/// Agree on the global maximum of `value` across all workers.
pub fn agree<C: Communicator + ?Sized>(comm: &C, value: f64) -> Result<PivotChoice, SolverError> {
    let values = comm.all_gather_f64(value)?;
    PivotChoice::reduce(&values)
        .ok_or_else(|| CommError::Protocol("pivot agreement over an empty group".into()).into())
}
