//! Flat-sky power utilities.
//!
//! Helpers for working with small square sky patches in the flat-sky
//! approximation: map geometry and its Fourier-space multipole grid, 2D
//! power maps, isotropic power-spectrum binning, the spin-2 E/B <-> Q/U
//! rotation, and the scaling fixups needed before feeding tabulated
//! spectra to a map synthesizer.

pub mod fft;

mod power;
mod scaling;
mod spin;

pub use power::{bin_power_spectrum, power_map_2d};
pub use scaling::{pad_monopole_dipole, pad_multipole_axis, remove_cl_scaling, remove_deflection_scaling};
pub use spin::{eb_to_qu, qu_to_eb};

use crate::domain::{SimError, SimResult};
use std::f64::consts::TAU;

/// Geometry of a flat-sky map: pixel counts and angular extents in
/// degrees. Dimensions must be even so Fourier quadrants pair up cleanly
/// under [`fft::fftshift2`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatMapGeometry {
    nx: usize,
    ny: usize,
    lx_deg: f64,
    ly_deg: f64,
}

impl FlatMapGeometry {
    pub fn new(nx: usize, ny: usize, lx_deg: f64, ly_deg: f64) -> SimResult<Self> {
        if nx == 0 || ny == 0 || nx % 2 != 0 || ny % 2 != 0 {
            return Err(SimError::input_validation(
                "FLATMAP.GEOMETRY",
                format!("map dimensions must be even and non-zero, got {nx}x{ny}"),
            ));
        }
        if lx_deg <= 0.0 || ly_deg <= 0.0 {
            return Err(SimError::input_validation(
                "FLATMAP.GEOMETRY",
                format!("map extents must be positive, got {lx_deg} x {ly_deg} degrees"),
            ));
        }
        Ok(Self {
            nx,
            ny,
            lx_deg,
            ly_deg,
        })
    }

    /// Square patch of `pixels` pixels spanning `degrees` on a side.
    pub fn square(pixels: usize, degrees: f64) -> SimResult<Self> {
        Self::new(pixels, pixels, degrees, degrees)
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn lx_rad(&self) -> f64 {
        self.lx_deg.to_radians()
    }

    pub fn ly_rad(&self) -> f64 {
        self.ly_deg.to_radians()
    }

    /// Pixel resolution in degrees.
    pub fn reso_deg(&self) -> f64 {
        self.lx_deg / self.nx as f64
    }

    pub fn reso_arcmin(&self) -> f64 {
        self.reso_deg() * 60.0
    }

    /// Fourier-to-sky conversion factor applied to FFT amplitudes.
    pub fn tfac(&self) -> f64 {
        self.lx_rad() / (self.nx * self.nx) as f64
    }

    /// Fundamental multipole along x: the mode whose wavelength spans the
    /// patch.
    pub fn delta_ell(&self) -> f64 {
        TAU / self.lx_rad()
    }

    /// Fundamental multipole along y.
    pub fn delta_ell_y(&self) -> f64 {
        TAU / self.ly_rad()
    }

    /// Largest multipole resolvable on both axes (the smaller of the two
    /// Nyquist modes).
    pub fn peak_ell(&self) -> f64 {
        let nyquist_x = (self.nx / 2) as f64 * self.delta_ell();
        let nyquist_y = (self.ny / 2) as f64 * self.delta_ell_y();
        nyquist_x.min(nyquist_y)
    }

    /// x multipole component for an unshifted FFT column index
    /// (non-negative for the first half, negative after).
    pub(crate) fn mode_x(&self, index: usize) -> f64 {
        signed_index(index, self.nx) * self.delta_ell()
    }

    /// y multipole component for an unshifted FFT row index.
    pub(crate) fn mode_y(&self, index: usize) -> f64 {
        signed_index(index, self.ny) * self.delta_ell_y()
    }
}

fn signed_index(index: usize, n: usize) -> f64 {
    if index < n.div_ceil(2) {
        index as f64
    } else {
        index as f64 - n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::FlatMapGeometry;

    #[test]
    fn square_patch_derives_its_multipole_grid() {
        let geometry = FlatMapGeometry::square(192, 5.0).expect("valid geometry");
        assert!((geometry.delta_ell() - 72.0).abs() < 1.0e-9);
        assert!((geometry.peak_ell() - 6912.0).abs() < 1.0e-6);
        assert!((geometry.reso_arcmin() - 1.5625).abs() < 1.0e-12);
        assert!((geometry.tfac() - geometry.lx_rad() / (192.0 * 192.0)).abs() < 1.0e-18);
    }

    #[test]
    fn odd_or_degenerate_dimensions_are_rejected() {
        assert_eq!(
            FlatMapGeometry::square(191, 5.0).unwrap_err().code(),
            "FLATMAP.GEOMETRY"
        );
        assert_eq!(
            FlatMapGeometry::square(0, 5.0).unwrap_err().code(),
            "FLATMAP.GEOMETRY"
        );
        assert_eq!(
            FlatMapGeometry::square(64, -1.0).unwrap_err().code(),
            "FLATMAP.GEOMETRY"
        );
    }

    #[test]
    fn axis_modes_wrap_negative_past_nyquist() {
        let geometry = FlatMapGeometry::square(8, 8.0).expect("valid geometry");
        let delta = geometry.delta_ell();
        assert_eq!(geometry.mode_x(0), 0.0);
        assert!((geometry.mode_x(3) - 3.0 * delta).abs() < 1.0e-12);
        assert!((geometry.mode_x(4) + 4.0 * delta).abs() < 1.0e-12);
        assert!((geometry.mode_x(7) + delta).abs() < 1.0e-12);
    }

    #[test]
    fn rectangular_patches_keep_per_axis_mode_spacing() {
        let geometry = FlatMapGeometry::new(16, 8, 4.0, 4.0).expect("valid geometry");
        assert!((geometry.delta_ell_y() - geometry.delta_ell()).abs() < 1.0e-12);
        assert!((geometry.mode_y(4) - 4.0 * geometry.delta_ell_y()).abs() < 1.0e-12);
        assert!((geometry.mode_y(7) + geometry.delta_ell_y()).abs() < 1.0e-12);
        // both axes span 4 degrees, so the shorter axis sets the peak
        assert!((geometry.peak_ell() - 4.0 * geometry.delta_ell_y()).abs() < 1.0e-9);
    }
}
