use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::decompose::Decomposition;
use crate::lattice::Cell;
use crate::strip::Strip;

/// One row of cell populations in flight between neighbouring ranks.
pub type HaloRow = Vec<Cell>;

/// A rank's endpoints into the halo ring: one outgoing and one incoming
/// link per vertical neighbour.
pub struct HaloLinks {
    pub to_above: Sender<HaloRow>,
    pub to_below: Sender<HaloRow>,
    pub from_above: Receiver<HaloRow>,
    pub from_below: Receiver<HaloRow>,
}

/// Build the ring fabric, one [`HaloLinks`] per rank.
///
/// Every directed edge is a single-row bounded channel: a sender can run at
/// most one exchange ahead of its receiver, so per-edge buffering stays at
/// one row and the pairing of sends and receives is deterministic.
pub fn ring(decomp: &Decomposition) -> Vec<HaloLinks> {
    let nprocs = decomp.nprocs();
    let mut up_tx = Vec::with_capacity(nprocs);
    let mut up_rx = Vec::with_capacity(nprocs);
    let mut down_tx = Vec::with_capacity(nprocs);
    let mut down_rx = Vec::with_capacity(nprocs);
    for _ in 0..nprocs {
        let (tx, rx) = bounded::<HaloRow>(1);
        up_tx.push(tx);
        up_rx.push(Some(rx));
        let (tx, rx) = bounded::<HaloRow>(1);
        down_tx.push(tx);
        down_rx.push(Some(rx));
    }

    (0..nprocs)
        .map(|rank| HaloLinks {
            to_above: up_tx[rank].clone(),
            to_below: down_tx[rank].clone(),
            // the rank above sends downward onto our top halo, and vice versa
            from_above: down_rx[decomp.above(rank)].take().expect("edge wired twice"),
            from_below: up_rx[decomp.below(rank)].take().expect("edge wired twice"),
        })
        .collect()
}

/// Refresh both halo rows ahead of `propagate`.
///
/// Two paired exchanges in fixed order: every rank first sends its bottom
/// computational row down and fills its top halo from above, then sends its
/// top computational row up and fills its bottom halo from below. A failed
/// send or receive means a neighbour rank died; that is fatal for the job.
pub fn exchange_halos(strip: &mut Strip, links: &HaloLinks) -> Result<()> {
    let rows = strip.rows();

    links
        .to_below
        .send(strip.cell_row(1).to_vec())
        .map_err(|_| anyhow!("halo send to the rank below failed"))?;
    let top = links
        .from_above
        .recv()
        .map_err(|_| anyhow!("halo receive from the rank above failed"))?;
    strip.set_cell_row(rows + 1, &top);

    links
        .to_above
        .send(strip.cell_row(rows).to_vec())
        .map_err(|_| anyhow!("halo send to the rank above failed"))?;
    let bottom = links
        .from_below
        .recv()
        .map_err(|_| anyhow!("halo receive from the rank below failed"))?;
    strip.set_cell_row(0, &bottom);

    Ok(())
}
