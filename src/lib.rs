pub mod decompose;
pub mod exchange;
pub mod grid;
pub mod lattice;
pub mod output;
pub mod params;
pub mod solver;
pub mod strip;

pub use decompose::Decomposition;
pub use grid::Grid;
pub use lattice::{Cell, D2Q9};
pub use params::Params;
pub use solver::Solver;
pub use strip::Strip;

pub type Float = f32;
