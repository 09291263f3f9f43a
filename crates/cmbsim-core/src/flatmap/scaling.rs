//! Scaling fixups for tabulated spectra.
//!
//! Solver tables carry the conventional `l(l+1)/2pi` scaling (and an
//! `l^4`-family factor on the deflection spectra); map synthesizers want
//! bare C_l starting at the monopole. These helpers undo the scaling and
//! pad the missing l=0,1 rows.

use ndarray::Array1;
use std::f64::consts::TAU;

/// Divides out `l(l+1)/2pi`. Entries at l=0 come back as zero rather
/// than a division by zero.
pub fn remove_cl_scaling(spectrum: &Array1<f64>, ells: &Array1<f64>) -> Array1<f64> {
    Array1::from_iter(spectrum.iter().zip(ells.iter()).map(|(&value, &ell)| {
        if ell < 1.0 {
            0.0
        } else {
            value * TAU / (ell * (ell + 1.0))
        }
    }))
}

/// Divides out the `l^4` deflection-family factor (times an extra
/// synthesizer-specific constant) from PP/PT spectra.
pub fn remove_deflection_scaling(
    spectrum: &Array1<f64>,
    ells: &Array1<f64>,
    fix_scaling: f64,
) -> Array1<f64> {
    Array1::from_iter(spectrum.iter().zip(ells.iter()).map(|(&value, &ell)| {
        if ell < 1.0 {
            0.0
        } else {
            value / (ell.powi(4) * fix_scaling)
        }
    }))
}

/// Prepends zero power for the l=0 and l=1 modes a solver table omits.
pub fn pad_monopole_dipole(spectrum: &Array1<f64>) -> Array1<f64> {
    let mut padded = Vec::with_capacity(spectrum.len() + 2);
    padded.extend([0.0, 0.0]);
    padded.extend(spectrum.iter().copied());
    Array1::from(padded)
}

/// The matching multipole-axis padding: prepends l=0 and l=1.
pub fn pad_multipole_axis(ells: &Array1<f64>) -> Array1<f64> {
    let mut padded = Vec::with_capacity(ells.len() + 2);
    padded.extend([0.0, 1.0]);
    padded.extend(ells.iter().copied());
    Array1::from(padded)
}
