use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};

use crate::grid::Grid;
use crate::lattice::D2Q9;
use crate::params::Params;

pub const FINAL_STATE_FILE: &str = "final_state.dat";
pub const AV_VELS_FILE: &str = "av_vels.dat";

/// Write the per-cell final field: position, velocity components, velocity
/// magnitude, pressure, obstacle flag.
///
/// Obstacle cells report zero velocity and the hydrostatic pressure
/// `density * cs^2`; fluid cells report values derived from their
/// populations.
pub fn write_final_state(path: &str, params: &Params, grid: &Grid) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("could not open output file: {path}"))?;
    let mut out = BufWriter::new(file);

    for jj in 0..params.ny {
        for ii in 0..params.nx {
            let idx = grid.idx(ii, jj);
            let blocked = grid.obstacles[idx];
            let (u_x, u_y, u, pressure) = if blocked {
                (0.0, 0.0, 0.0, params.density * D2Q9::CS2)
            } else {
                let cell = &grid.cells[idx];
                let local_density = cell.density();
                let [u_x, u_y] = cell.velocity(local_density);
                let u = (u_x * u_x + u_y * u_y).sqrt();
                (u_x, u_y, u, local_density * D2Q9::CS2)
            };
            writeln!(
                out,
                "{} {} {:.12E} {:.12E} {:.12E} {:.12E} {}",
                ii, jj, u_x, u_y, u, pressure, blocked as i32
            )
            .with_context(|| format!("could not write output file: {path}"))?;
        }
    }
    Ok(())
}

/// Write the per-timestep average-velocity trace, one `<t>:\t<value>` line
/// per step.
pub fn write_av_vels(path: &str, av_vels: &[f64]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("could not open output file: {path}"))?;
    let mut out = BufWriter::new(file);

    for (tt, vel) in av_vels.iter().enumerate() {
        writeln!(out, "{tt}:\t{vel:.12E}")
            .with_context(|| format!("could not write output file: {path}"))?;
    }
    Ok(())
}

/// Reynolds number from the final average velocity.
pub fn calc_reynolds(params: &Params, u_avg: f64) -> f64 {
    u_avg * params.reynolds_dim as f64 / f64::from(params.viscosity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params_4x4() -> Params {
        Params {
            nx: 4,
            ny: 4,
            max_iters: 1,
            reynolds_dim: 4,
            density: 0.1,
            accel: 0.005,
            omega: 1.0,
        }
    }

    fn scratch_path(name: &str) -> String {
        let path = std::env::temp_dir().join(format!("d2q9-bgk-{}-{name}", std::process::id()));
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn av_vels_lines_are_tab_separated_scientific() {
        let path = scratch_path("av_vels.dat");
        write_av_vels(&path, &[0.001234, 0.25]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, ["0:\t1.234000000000E-3", "1:\t2.500000000000E-1"]);
    }

    #[test]
    fn final_state_reports_rest_pressure_everywhere_at_init() {
        let params = params_4x4();
        let mut grid = Grid::new(&params);
        let blocked = grid.idx(2, 1);
        grid.obstacles[blocked] = true;

        let path = scratch_path("final_state.dat");
        write_final_state(&path, &params, &grid).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 16);
        for line in &lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            assert_eq!(fields.len(), 7);
            let i: usize = fields[0].parse().unwrap();
            let j: usize = fields[1].parse().unwrap();
            let u: f32 = fields[4].parse().unwrap();
            let pressure: f32 = fields[5].parse().unwrap();
            assert_eq!(u, 0.0);
            assert_relative_eq!(pressure, 0.1 / 3.0, max_relative = 1e-5);
            let flag = if i == 2 && j == 1 { "1" } else { "0" };
            assert_eq!(fields[6], flag);
        }
    }

    #[test]
    fn reynolds_scales_with_the_characteristic_dimension() {
        let params = params_4x4();
        // omega = 1 gives viscosity 1/6
        assert_relative_eq!(calc_reynolds(&params, 0.5), 0.5 * 4.0 * 6.0, max_relative = 1e-6);
    }
}
