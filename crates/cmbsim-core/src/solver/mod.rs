//! Boltzmann-solver boundary.
//!
//! The engine never computes theoretical spectra itself; it requests them
//! from a [`BoltzmannSolver`] implementation. The shipped backend replays
//! a precomputed spectra table (see [`TabulatedSolver`]); tests substitute
//! synthetic backends.

mod tabulated;

pub use tabulated::TabulatedSolver;

use crate::config::ParameterSet;
use crate::domain::SimResult;
use ndarray::Array2;

/// Normalization and unit flags passed through to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolverFlags {
    /// Return raw C_l instead of l(l+1)/2pi-scaled spectra (and the
    /// corresponding deflection-family scaling for the potential block).
    pub raw_cl: bool,
    /// Return dimensionless temperature spectra instead of muK^2 (TE in
    /// muK). Lensing-potential cross-spectra are unaffected.
    pub dimensionless_tt: bool,
}

/// Solver output over `l = 0..=max_l`: a total block with columns
/// TT, EE, BB, TE and a lensing-potential block with columns PP, PT, PE.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSpectra {
    pub total: Array2<f64>,
    pub lens_potential: Array2<f64>,
}

impl SolverSpectra {
    pub const COL_TT: usize = 0;
    pub const COL_EE: usize = 1;
    pub const COL_BB: usize = 2;
    pub const COL_TE: usize = 3;

    pub const COL_PP: usize = 0;
    pub const COL_PT: usize = 1;
    pub const COL_PE: usize = 2;

    /// Number of multipole rows (identical in both blocks).
    pub fn rows(&self) -> usize {
        self.total.nrows()
    }
}

/// A theoretical-spectrum backend: given a fully resolved parameter set,
/// produce total and lensing-potential spectra up to `max_l` inclusive.
///
/// Errors abort the current sweep point, and with it the sweep, unless
/// the caller wraps each iteration.
pub trait BoltzmannSolver {
    fn compute(
        &self,
        params: &ParameterSet,
        max_l: usize,
        flags: SolverFlags,
    ) -> SimResult<SolverSpectra>;
}
