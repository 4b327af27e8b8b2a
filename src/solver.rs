use std::thread;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use crate::decompose::Decomposition;
use crate::exchange::{self, HaloLinks};
use crate::grid::Grid;
use crate::lattice::Cell;
use crate::params::Params;
use crate::strip::Strip;

/// Channel endpoints a worker rank holds toward rank 0.
struct WorkerPorts {
    links: HaloLinks,
    obstacles_rx: Receiver<Vec<bool>>,
    seed_rx: Receiver<Vec<Cell>>,
    strip_tx: Sender<Vec<Cell>>,
    vels_tx: Sender<Vec<f64>>,
}

/// Rank 0's endpoints toward one worker.
struct RootPorts {
    obstacles_tx: Sender<Vec<bool>>,
    seed_tx: Sender<Vec<Cell>>,
    strip_rx: Receiver<Vec<Cell>>,
    vels_rx: Receiver<Vec<f64>>,
}

/// Drives a full simulation: scatter, the timestep loop on every rank,
/// gather, and the global average-velocity reduction.
///
/// Each rank runs on its own thread and owns its strip exclusively; all
/// cross-rank data movement is by message. Rank 0 additionally owns the
/// global grid and runs on the calling thread.
pub struct Solver {
    params: Params,
    decomp: Decomposition,
}

impl Solver {
    pub fn new(params: Params, nprocs: usize) -> Result<Self> {
        let decomp = Decomposition::new(params.ny, nprocs)?;
        Ok(Self { params, decomp })
    }

    /// Run `max_iters` timesteps over `grid`, leaving the final state in
    /// place and returning the normalized per-step average velocities.
    pub fn run(&self, grid: &mut Grid) -> Result<Vec<f64>> {
        let nprocs = self.decomp.nprocs();
        let n_flow = grid.n_flow();
        info!(
            "running {} timesteps on {} rank(s), {} fluid cells",
            self.params.max_iters, nprocs, n_flow
        );

        let mut links = exchange::ring(&self.decomp);
        let root_links = links.remove(0);

        let mut worker_ports = Vec::with_capacity(nprocs - 1);
        let mut root_ports = Vec::with_capacity(nprocs - 1);
        for links in links {
            let (obstacles_tx, obstacles_rx) = bounded(1);
            let (seed_tx, seed_rx) = bounded(1);
            let (strip_tx, strip_rx) = bounded(1);
            let (vels_tx, vels_rx) = bounded(1);
            worker_ports.push(WorkerPorts {
                links,
                obstacles_rx,
                seed_rx,
                strip_tx,
                vels_tx,
            });
            root_ports.push(RootPorts {
                obstacles_tx,
                seed_tx,
                strip_rx,
                vels_rx,
            });
        }

        let params = &self.params;
        let decomp = self.decomp;
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(nprocs - 1);
            for (offset, ports) in worker_ports.into_iter().enumerate() {
                let rank = offset + 1;
                handles.push(scope.spawn(move || worker_rank(params, decomp, rank, ports)));
            }

            // Rank 0's endpoints are owned by this call, so an early bail
            // drops them and unblocks every worker still waiting on us.
            let root_outcome = root_rank(params, decomp, grid, n_flow, root_links, root_ports);

            let mut first_err = None;
            let av_vels = match root_outcome {
                Ok(vels) => Some(vels),
                Err(err) => {
                    first_err = Some(err);
                    None
                }
            };
            for (offset, handle) in handles.into_iter().enumerate() {
                let rank = offset + 1;
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        if first_err.is_none() {
                            first_err = Some(err.context(format!("rank {rank} failed")));
                        }
                    }
                    Err(_) => {
                        if first_err.is_none() {
                            first_err = Some(anyhow!("rank {rank} panicked"));
                        }
                    }
                }
            }
            match first_err {
                Some(err) => Err(err),
                None => av_vels.ok_or_else(|| anyhow!("rank 0 produced no result")),
            }
        })
    }
}

/// Rank 0: scatter the grid, run its own strip, gather everything back and
/// finish the reduction.
fn root_rank(
    params: &Params,
    decomp: Decomposition,
    grid: &mut Grid,
    n_flow: usize,
    links: HaloLinks,
    ports: Vec<RootPorts>,
) -> Result<Vec<f64>> {
    let nx = grid.nx();
    let rows = decomp.rows(0);
    debug!("rank 0 owns {rows} rows starting at row 0");

    // Scatter: the local strip by copy, remote strips row-by-row. Obstacle
    // strips carry their halo rows so they never need re-sending.
    let mut strip = Strip::new(nx, rows, 0);
    strip.set_obstacle_rows(&local_obstacle_mask(grid, &decomp, 0));
    for j in 0..rows {
        strip.set_cell_row(j + 1, &grid.cells[j * nx..(j + 1) * nx]);
    }
    for (offset, port) in ports.iter().enumerate() {
        let rank = offset + 1;
        port.obstacles_tx
            .send(local_obstacle_mask(grid, &decomp, rank))
            .map_err(|_| anyhow!("obstacle scatter to rank {rank} failed"))?;
        let row_offset = decomp.row_offset(rank);
        for j in 0..decomp.rows(rank) {
            let global = row_offset + j;
            port.seed_tx
                .send(grid.cells[global * nx..(global + 1) * nx].to_vec())
                .map_err(|_| anyhow!("cell scatter to rank {rank} failed"))?;
        }
    }

    let pb = ProgressBar::new(params.max_iters as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message("d2q9-bgk");

    let mut av_vels = run_timesteps(params, &mut strip, &links, Some(&pb))?;
    pb.finish_with_message(format!("completed {} timesteps", params.max_iters));

    // Gather: the local strip back by copy, remote strips row-by-row, then
    // each rank's per-step velocity sums.
    for j in 0..rows {
        grid.cells[j * nx..(j + 1) * nx].copy_from_slice(strip.cell_row(j + 1));
    }
    for (offset, port) in ports.iter().enumerate() {
        let rank = offset + 1;
        let row_offset = decomp.row_offset(rank);
        for j in 0..decomp.rows(rank) {
            let row = port
                .strip_rx
                .recv()
                .map_err(|_| anyhow!("cell gather from rank {rank} failed"))?;
            let global = row_offset + j;
            grid.cells[global * nx..(global + 1) * nx].copy_from_slice(&row);
        }
        let vels = port
            .vels_rx
            .recv()
            .map_err(|_| anyhow!("velocity gather from rank {rank} failed"))?;
        if vels.len() != av_vels.len() {
            bail!("rank {rank} reported {} timesteps, expected {}", vels.len(), av_vels.len());
        }
        for (total, partial) in av_vels.iter_mut().zip(&vels) {
            *total += partial;
        }
    }

    // Normalize; an all-obstacle grid has nothing flowing.
    let scale = if n_flow == 0 {
        0.0
    } else {
        1.0 / (100.0 * n_flow as f64)
    };
    for vel in &mut av_vels {
        *vel *= scale;
    }

    Ok(av_vels)
}

/// Ranks 1..P: receive a strip, run the loop, send the strip back.
fn worker_rank(
    params: &Params,
    decomp: Decomposition,
    rank: usize,
    ports: WorkerPorts,
) -> Result<()> {
    let rows = decomp.rows(rank);
    let mut strip = Strip::new(params.nx, rows, decomp.row_offset(rank));

    let mask = ports
        .obstacles_rx
        .recv()
        .map_err(|_| anyhow!("obstacle scatter receive failed on rank {rank}"))?;
    strip.set_obstacle_rows(&mask);
    for j in 1..=rows {
        let row = ports
            .seed_rx
            .recv()
            .map_err(|_| anyhow!("cell scatter receive failed on rank {rank}"))?;
        strip.set_cell_row(j, &row);
    }

    let av_vels = run_timesteps(params, &mut strip, &ports.links, None)?;

    for j in 1..=rows {
        ports
            .strip_tx
            .send(strip.cell_row(j).to_vec())
            .map_err(|_| anyhow!("cell gather send failed on rank {rank}"))?;
    }
    ports
        .vels_tx
        .send(av_vels)
        .map_err(|_| anyhow!("velocity gather send failed on rank {rank}"))?;
    Ok(())
}

/// The per-rank timestep loop.
///
/// The body force runs before the halo exchange so that when the driven
/// row is a strip's edge row, the neighbour's halo sees the freshly
/// accelerated populations; the decomposed run then matches the serial one
/// bit for bit.
fn run_timesteps(
    params: &Params,
    strip: &mut Strip,
    links: &HaloLinks,
    progress: Option<&ProgressBar>,
) -> Result<Vec<f64>> {
    let mut av_vels = Vec::with_capacity(params.max_iters);
    for tt in 0..params.max_iters {
        strip.accelerate_flow(params);
        exchange::exchange_halos(strip, links)?;
        strip.propagate();
        strip.rebound();
        strip.collision(params.omega);
        av_vels.push(strip.av_velocity());

        if let Some(pb) = progress {
            pb.set_position(tt as u64 + 1);
        }
    }
    Ok(av_vels)
}

/// The obstacle mask for one rank's strip, halo rows included, read
/// straight out of the global mask with vertical wrap.
fn local_obstacle_mask(grid: &Grid, decomp: &Decomposition, rank: usize) -> Vec<bool> {
    let nx = grid.nx();
    let ny = grid.ny();
    let rows = decomp.rows(rank);
    let row_offset = decomp.row_offset(rank);
    let mut mask = Vec::with_capacity((rows + 2) * nx);
    for local in 0..rows + 2 {
        let global = (row_offset + local + ny - 1) % ny;
        mask.extend_from_slice(&grid.obstacles[global * nx..(global + 1) * nx]);
    }
    mask
}
