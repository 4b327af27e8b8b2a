use anyhow::{anyhow, bail, Context, Result};

use crate::Float;

/// Simulation parameters, immutable after load.
#[derive(Debug, Clone)]
pub struct Params {
    pub nx: usize,
    pub ny: usize,
    pub max_iters: usize,
    pub reynolds_dim: usize,
    pub density: Float,
    pub accel: Float,
    pub omega: Float,
}

impl Params {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not open input parameter file: {path}"))?;
        Self::parse(&content).with_context(|| format!("could not read param file: {path}"))
    }

    fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines().map(str::trim).filter(|line| !line.is_empty());
        let mut field = move |name: &'static str| {
            lines
                .next()
                .ok_or_else(|| anyhow!("could not read param file: {name}"))
        };

        let params = Self {
            nx: parse_field(field("nx")?, "nx")?,
            ny: parse_field(field("ny")?, "ny")?,
            max_iters: parse_field(field("max_iters")?, "max_iters")?,
            reynolds_dim: parse_field(field("reynolds_dim")?, "reynolds_dim")?,
            density: parse_field(field("density")?, "density")?,
            accel: parse_field(field("accel")?, "accel")?,
            omega: parse_field(field("omega")?, "omega")?,
        };
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            bail!("grid dimensions must be positive, got {}x{}", self.nx, self.ny);
        }
        if !(self.density > 0.0) {
            bail!("density must be positive, got {}", self.density);
        }
        if !(self.omega > 0.0 && self.omega < 2.0) {
            bail!("omega must lie in (0, 2) for BGK stability, got {}", self.omega);
        }
        Ok(())
    }

    /// Kinematic viscosity implied by the relaxation parameter
    pub fn viscosity(&self) -> Float {
        (2.0 / self.omega - 1.0) / 6.0
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, name: &'static str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("could not read param file: {name} (got {value:?})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GOOD: &str = "128\n256\n1000\n128\n0.1\n0.005\n1.7\n";

    #[test]
    fn parses_the_seven_fields_in_order() {
        let params = Params::parse(GOOD).unwrap();
        assert_eq!(params.nx, 128);
        assert_eq!(params.ny, 256);
        assert_eq!(params.max_iters, 1000);
        assert_eq!(params.reynolds_dim, 128);
        assert_relative_eq!(params.density, 0.1);
        assert_relative_eq!(params.accel, 0.005);
        assert_relative_eq!(params.omega, 1.7);
    }

    #[test]
    fn zero_iterations_is_a_valid_run_length() {
        let params = Params::parse("4\n4\n0\n4\n0.1\n0.005\n1.0\n").unwrap();
        assert_eq!(params.max_iters, 0);
    }

    #[test]
    fn rejects_a_truncated_file() {
        let err = Params::parse("128\n256\n1000\n").unwrap_err();
        assert!(err.to_string().contains("reynolds_dim"));
    }

    #[test]
    fn rejects_unparseable_fields() {
        let err = Params::parse("128\nlots\n1000\n128\n0.1\n0.005\n1.7\n").unwrap_err();
        assert!(err.to_string().contains("ny"));
    }

    #[test]
    fn rejects_unstable_omega() {
        assert!(Params::parse("128\n256\n1000\n128\n0.1\n0.005\n2.0\n").is_err());
        assert!(Params::parse("128\n256\n1000\n128\n0.1\n0.005\n0.0\n").is_err());
    }

    #[test]
    fn viscosity_follows_omega() {
        let params = Params::parse("4\n4\n1\n4\n0.1\n0.005\n1.0\n").unwrap();
        assert_relative_eq!(params.viscosity(), 1.0 / 6.0, max_relative = 1e-6);
    }
}
