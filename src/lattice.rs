use crate::Float;

/// D2Q9 lattice-Boltzmann model constants and structures
pub struct D2Q9;

impl D2Q9 {
    /// Number of discrete velocities
    pub const Q: usize = 9;

    /// Discrete velocities: rest, the four axial directions, then the
    /// four diagonals
    ///
    /// ```text
    /// 6 2 5
    ///  \|/
    /// 3-0-1
    ///  /|\
    /// 7 4 8
    /// ```
    pub const VELOCITIES: [[i32; 2]; 9] = [
        // Rest
        [0, 0],
        // Axial neighbors (4)
        [1, 0], [0, 1], [-1, 0], [0, -1],
        // Diagonal neighbors (4)
        [1, 1], [-1, 1], [-1, -1], [1, -1],
    ];

    /// Weights for each direction
    pub const WEIGHTS: [Float; 9] = [
        // Rest
        4.0 / 9.0,
        // Axial neighbors (4)
        1.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0,
        // Diagonal neighbors (4)
        1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0, 1.0 / 36.0,
    ];

    /// Opposite directions for bounce-back boundary conditions
    pub const OPPOSITE: [usize; 9] = [
        0,  // Rest stays the same
        3, 4, 1, 2,  // Axial opposites
        7, 8, 5, 6,  // Diagonal opposites
    ];

    /// Speed of sound squared
    pub const CS2: Float = 1.0 / 3.0;
}

/// A single lattice cell holding the nine speed populations
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cell {
    /// Distribution functions (f_i)
    pub speeds: [Float; D2Q9::Q],
}

impl Cell {
    /// Cell at rest-state equilibrium for the given density
    pub fn rest_equilibrium(density: Float) -> Self {
        let mut cell = Self::default();
        for i in 0..D2Q9::Q {
            cell.speeds[i] = D2Q9::WEIGHTS[i] * density;
        }
        cell
    }

    /// Calculate equilibrium distribution function
    pub fn equilibrium_distribution(
        direction: usize,
        density: Float,
        velocity: [Float; 2],
    ) -> Float {
        let weight = D2Q9::WEIGHTS[direction];
        let c = D2Q9::VELOCITIES[direction];

        // Dot product of velocity and lattice velocity
        let cu = c[0] as Float * velocity[0] + c[1] as Float * velocity[1];

        // Velocity magnitude squared
        let u2 = velocity[0] * velocity[0] + velocity[1] * velocity[1];

        weight * density
            * (1.0 + cu / D2Q9::CS2 + cu * cu / (2.0 * D2Q9::CS2 * D2Q9::CS2)
                - u2 / (2.0 * D2Q9::CS2))
    }

    /// Local density: the sum of all populations
    pub fn density(&self) -> Float {
        self.speeds.iter().sum()
    }

    /// Macroscopic velocity components for a known local density
    pub fn velocity(&self, density: Float) -> [Float; 2] {
        let mut u = [0.0; 2];
        for i in 0..D2Q9::Q {
            let c = D2Q9::VELOCITIES[i];
            u[0] += self.speeds[i] * c[0] as Float;
            u[1] += self.speeds[i] * c[1] as Float;
        }
        [u[0] / density, u[1] / density]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_one() {
        let total: Float = D2Q9::WEIGHTS.iter().sum();
        assert_relative_eq!(total, 1.0, max_relative = 1e-6);
    }

    #[test]
    fn opposite_reverses_velocities() {
        for i in 0..D2Q9::Q {
            let opp = D2Q9::OPPOSITE[i];
            assert_eq!(D2Q9::OPPOSITE[opp], i);
            assert_eq!(D2Q9::VELOCITIES[opp][0], -D2Q9::VELOCITIES[i][0]);
            assert_eq!(D2Q9::VELOCITIES[opp][1], -D2Q9::VELOCITIES[i][1]);
        }
    }

    #[test]
    fn rest_equilibrium_recovers_density() {
        let cell = Cell::rest_equilibrium(0.1);
        assert_relative_eq!(cell.density(), 0.1, max_relative = 1e-6);
        let [u_x, u_y] = cell.velocity(cell.density());
        assert_eq!(u_x, 0.0);
        assert_eq!(u_y, 0.0);
    }

    #[test]
    fn equilibrium_matches_weights_at_rest() {
        for i in 0..D2Q9::Q {
            let d_eq = Cell::equilibrium_distribution(i, 1.0, [0.0, 0.0]);
            assert_relative_eq!(d_eq, D2Q9::WEIGHTS[i], max_relative = 1e-6);
        }
    }
}
