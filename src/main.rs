use std::env;
use std::time::Instant;

use anyhow::Result;
use log::info;

use d2q9_bgk::{decompose, output, Grid, Params, Solver};

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <paramfile> <obstaclefile>", args[0]);
        eprintln!("  paramfile    - plain-text simulation parameters, one per line");
        eprintln!("  obstaclefile - blocked cells, one 'x y 1' line per cell");
        std::process::exit(1);
    }

    let paramfile = &args[1];
    let obstaclefile = &args[2];

    info!("loading parameters from: {paramfile}");
    let params = Params::from_file(paramfile)?;

    info!("simulation parameters:");
    info!("  grid: {}x{}", params.nx, params.ny);
    info!("  timesteps: {}", params.max_iters);
    info!(
        "  density: {}, accel: {}, omega: {}",
        params.density, params.accel, params.omega
    );
    info!("  kinematic viscosity: {}", params.viscosity());

    info!("loading obstacles from: {obstaclefile}");
    let mut grid = Grid::new(&params);
    grid.load_obstacles(obstaclefile)?;
    info!(
        "  {} blocked cells, {} fluid cells",
        params.nx * params.ny - grid.n_flow(),
        grid.n_flow()
    );

    let nprocs = decompose::resolve_nprocs(params.ny)?;
    let solver = Solver::new(params.clone(), nprocs)?;

    let tic = Instant::now();
    let av_vels = solver.run(&mut grid)?;
    let elapsed = tic.elapsed();

    let u_last = av_vels.last().copied().unwrap_or(0.0);
    info!("==done==");
    info!("Reynolds number: {:.12E}", output::calc_reynolds(&params, u_last));
    info!("elapsed time: {:.6} s", elapsed.as_secs_f64());

    output::write_final_state(output::FINAL_STATE_FILE, &params, &grid)?;
    output::write_av_vels(output::AV_VELS_FILE, &av_vels)?;
    info!("wrote {} and {}", output::FINAL_STATE_FILE, output::AV_VELS_FILE);

    Ok(())
}
