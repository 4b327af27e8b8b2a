use anyhow::{bail, Context, Result};

use crate::lattice::Cell;
use crate::params::Params;
use crate::Float;

/// The full simulation domain: cells and obstacle mask in row-major order,
/// element (row `j`, column `i`) at linear index `j * nx + i`.
///
/// Only rank 0 ever owns one of these; every other rank works on a
/// [`crate::Strip`] received at scatter time.
#[derive(Debug, Clone)]
pub struct Grid {
    nx: usize,
    ny: usize,
    pub cells: Vec<Cell>,
    pub obstacles: Vec<bool>,
}

impl Grid {
    /// Fresh grid with every cell at rest equilibrium and no obstacles.
    pub fn new(params: &Params) -> Self {
        Self {
            nx: params.nx,
            ny: params.ny,
            cells: vec![Cell::rest_equilibrium(params.density); params.nx * params.ny],
            obstacles: vec![false; params.nx * params.ny],
        }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }

    /// Load the blocked-cell list, one `x y 1` line per obstacle.
    pub fn load_obstacles(&mut self, path: &str) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not open input obstacles file: {path}"))?;
        self.apply_obstacles(&content)
            .with_context(|| format!("could not read obstacles file: {path}"))
    }

    fn apply_obstacles(&mut self, content: &str) -> Result<()> {
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<i64> = line
                .split_whitespace()
                .map(|field| field.parse::<i64>())
                .collect::<Result<_, _>>()
                .map_err(|_| parse_error(n))?;
            let &[x, y, blocked] = &fields[..] else {
                return Err(parse_error(n));
            };
            if x < 0 || x >= self.nx as i64 {
                bail!("obstacle x-coord out of range (line {})", n + 1);
            }
            if y < 0 || y >= self.ny as i64 {
                bail!("obstacle y-coord out of range (line {})", n + 1);
            }
            if blocked != 1 {
                bail!("obstacle blocked value should be 1 (line {})", n + 1);
            }
            let idx = self.idx(x as usize, y as usize);
            self.obstacles[idx] = true;
        }
        Ok(())
    }

    /// Count of non-obstacle cells.
    pub fn n_flow(&self) -> usize {
        self.obstacles.iter().filter(|blocked| !**blocked).count()
    }

    /// Sum of every population over the whole grid. A correct timestep
    /// without the body force keeps this constant.
    pub fn total_density(&self) -> Float {
        self.cells.iter().map(Cell::density).sum()
    }
}

fn parse_error(line: usize) -> anyhow::Error {
    anyhow::anyhow!("expected 3 values per line in obstacle file (line {})", line + 1)
}
