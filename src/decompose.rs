use anyhow::{bail, Context, Result};

/// Row-strip decomposition of the global grid across `nprocs` ranks.
///
/// Rank `r < P-1` owns `ny / P` contiguous rows and the last rank also
/// takes the remainder. Neighbours wrap modulo `P`, matching the vertical
/// periodicity of the lattice.
#[derive(Debug, Clone, Copy)]
pub struct Decomposition {
    ny: usize,
    nprocs: usize,
}

impl Decomposition {
    pub fn new(ny: usize, nprocs: usize) -> Result<Self> {
        if nprocs == 0 {
            bail!("rank count must be positive");
        }
        if ny < nprocs {
            bail!("grid height {ny} is smaller than the rank count {nprocs}");
        }
        Ok(Self { ny, nprocs })
    }

    pub fn nprocs(&self) -> usize {
        self.nprocs
    }

    /// Number of computational rows owned by `rank`.
    pub fn rows(&self, rank: usize) -> usize {
        let base = self.ny / self.nprocs;
        if rank == self.nprocs - 1 {
            base + self.ny % self.nprocs
        } else {
            base
        }
    }

    /// Global index of the first row owned by `rank`.
    pub fn row_offset(&self, rank: usize) -> usize {
        rank * (self.ny / self.nprocs)
    }

    /// Ring neighbour holding the strip above `rank`.
    pub fn above(&self, rank: usize) -> usize {
        (rank + 1) % self.nprocs
    }

    /// Ring neighbour holding the strip below `rank`.
    pub fn below(&self, rank: usize) -> usize {
        (rank + self.nprocs - 1) % self.nprocs
    }
}

/// Rank count for this run: the `D2Q9_BGK_PROCS` environment variable when
/// the launcher sets it, otherwise the available parallelism clamped to the
/// number of grid rows.
pub fn resolve_nprocs(ny: usize) -> Result<usize> {
    if let Ok(raw) = std::env::var("D2Q9_BGK_PROCS") {
        return raw
            .parse()
            .with_context(|| format!("invalid D2Q9_BGK_PROCS value: {raw:?}"));
    }
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    Ok(available.min(ny).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_cover_the_grid_exactly() {
        for (ny, nprocs) in [(8, 1), (8, 4), (10, 4), (9, 2), (16, 5)] {
            let decomp = Decomposition::new(ny, nprocs).unwrap();
            let total: usize = (0..nprocs).map(|rank| decomp.rows(rank)).sum();
            assert_eq!(total, ny, "ny={ny} nprocs={nprocs}");
            for rank in 1..nprocs {
                assert_eq!(
                    decomp.row_offset(rank),
                    decomp.row_offset(rank - 1) + decomp.rows(rank - 1),
                );
            }
        }
    }

    #[test]
    fn remainder_rows_go_to_the_last_rank() {
        let decomp = Decomposition::new(10, 4).unwrap();
        assert_eq!(decomp.rows(0), 2);
        assert_eq!(decomp.rows(2), 2);
        assert_eq!(decomp.rows(3), 4);
        assert_eq!(decomp.row_offset(3), 6);
    }

    #[test]
    fn neighbours_form_a_ring() {
        let decomp = Decomposition::new(8, 4).unwrap();
        assert_eq!(decomp.above(3), 0);
        assert_eq!(decomp.below(0), 3);
        for rank in 0..4 {
            assert_eq!(decomp.below(decomp.above(rank)), rank);
        }

        let single = Decomposition::new(8, 1).unwrap();
        assert_eq!(single.above(0), 0);
        assert_eq!(single.below(0), 0);
    }

    #[test]
    fn rejects_more_ranks_than_rows() {
        assert!(Decomposition::new(4, 5).is_err());
        assert!(Decomposition::new(4, 0).is_err());
    }
}
