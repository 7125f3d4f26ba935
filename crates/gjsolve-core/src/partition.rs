//! Static, contiguous, size-balanced row partitioning.
//!
//! Worker `r` receives `remaining / (workers - r)` rows, assigned
//! sequentially for `r = 0..workers` with `remaining` decremented after each
//! worker. Block sizes therefore differ by at most one row, with the larger
//! blocks at the high ranks (e.g. 5 rows over 3 workers is `[1, 2, 2]`).

/// Row counts and offsets per worker for an `n`-row system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPartition {
    dimension: usize,
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl RowPartition {
    /// Split `dimension` rows over `workers` workers.
    ///
    /// # Panics
    /// If `workers` is zero.
    pub fn new(dimension: usize, workers: usize) -> Self {
        assert!(workers > 0, "Partition needs at least one worker");

        let mut counts = Vec::with_capacity(workers);
        let mut offsets = Vec::with_capacity(workers);
        let mut remaining = dimension;
        let mut offset = 0;
        for r in 0..workers {
            let rows = remaining / (workers - r);
            counts.push(rows);
            offsets.push(offset);
            offset += rows;
            remaining -= rows;
        }

        Self {
            dimension,
            counts,
            offsets,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Rows held by worker `rank`.
    pub fn rows(&self, rank: usize) -> usize {
        self.counts[rank]
    }

    /// Global index of worker `rank`'s first row.
    pub fn offset(&self, rank: usize) -> usize {
        self.offsets[rank]
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Per-worker element counts for rows of `width` values each.
    pub fn element_counts(&self, width: usize) -> Vec<usize> {
        self.counts.iter().map(|&c| c * width).collect()
    }

    /// Per-worker element offsets for rows of `width` values each.
    pub fn element_offsets(&self, width: usize) -> Vec<usize> {
        self.offsets.iter().map(|&o| o * width).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_for_all_small_sizes() {
        for workers in 1..=9 {
            for n in 0..=40 {
                let p = RowPartition::new(n, workers);
                assert_eq!(p.counts().iter().sum::<usize>(), n, "n={} P={}", n, workers);
                let max = *p.counts().iter().max().unwrap();
                let min = *p.counts().iter().min().unwrap();
                assert!(max - min <= 1, "n={} P={} counts={:?}", n, workers, p.counts());
                for r in 1..workers {
                    assert_eq!(p.offset(r), p.offset(r - 1) + p.rows(r - 1));
                }
            }
        }
    }

    #[test]
    fn test_larger_blocks_go_last() {
        let p = RowPartition::new(5, 3);
        assert_eq!(p.counts(), &[1, 2, 2]);
        assert_eq!(p.offsets(), &[0, 1, 3]);
        assert_eq!(p.offset(2) + p.rows(2), 5);
        assert_eq!(p.element_counts(5), vec![5, 10, 10]);
        assert_eq!(p.element_offsets(5), vec![0, 5, 15]);
    }

    #[test]
    fn test_more_workers_than_rows() {
        let p = RowPartition::new(2, 4);
        assert_eq!(p.counts(), &[0, 0, 1, 1]);
        assert_eq!(p.offsets(), &[0, 0, 0, 1]);
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn test_zero_workers_panics() {
        RowPartition::new(4, 0);
    }
}
