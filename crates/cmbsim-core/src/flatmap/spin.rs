//! Spin-2 rotation between the Q/U and E/B polarization bases.
//!
//! Both directions operate on Fourier-domain map pairs in unshifted FFT
//! ordering; the rotation angle at each mode is `2 * atan2(ly, -lx)`, so
//! the two functions are exact inverses of each other.

use super::FlatMapGeometry;
use crate::domain::{SimError, SimResult};
use ndarray::Array2;
use num_complex::Complex64;

/// Rotates Fourier-domain Q/U maps into E/B.
pub fn qu_to_eb(
    q_fft: &Array2<Complex64>,
    u_fft: &Array2<Complex64>,
    geometry: &FlatMapGeometry,
) -> SimResult<(Array2<Complex64>, Array2<Complex64>)> {
    check_pair(q_fft, u_fft, geometry)?;
    let mut e_fft = Array2::zeros(q_fft.dim());
    let mut b_fft = Array2::zeros(q_fft.dim());
    for ((i, j), angle) in rotation_angles(geometry) {
        let (sin, cos) = angle.sin_cos();
        e_fft[(i, j)] = q_fft[(i, j)] * cos + u_fft[(i, j)] * sin;
        b_fft[(i, j)] = -q_fft[(i, j)] * sin + u_fft[(i, j)] * cos;
    }
    Ok((e_fft, b_fft))
}

/// Rotates Fourier-domain E/B maps into Q/U.
pub fn eb_to_qu(
    e_fft: &Array2<Complex64>,
    b_fft: &Array2<Complex64>,
    geometry: &FlatMapGeometry,
) -> SimResult<(Array2<Complex64>, Array2<Complex64>)> {
    check_pair(e_fft, b_fft, geometry)?;
    let mut q_fft = Array2::zeros(e_fft.dim());
    let mut u_fft = Array2::zeros(e_fft.dim());
    for ((i, j), angle) in rotation_angles(geometry) {
        let (sin, cos) = angle.sin_cos();
        q_fft[(i, j)] = e_fft[(i, j)] * cos - b_fft[(i, j)] * sin;
        u_fft[(i, j)] = e_fft[(i, j)] * sin + b_fft[(i, j)] * cos;
    }
    Ok((q_fft, u_fft))
}

fn rotation_angles(
    geometry: &FlatMapGeometry,
) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
    let (ny, nx) = (geometry.ny(), geometry.nx());
    (0..ny).flat_map(move |i| {
        let ly = geometry.mode_y(i);
        (0..nx).map(move |j| {
            let lx = geometry.mode_x(j);
            ((i, j), 2.0 * ly.atan2(-lx))
        })
    })
}

fn check_pair(
    first: &Array2<Complex64>,
    second: &Array2<Complex64>,
    geometry: &FlatMapGeometry,
) -> SimResult<()> {
    let expected = (geometry.ny(), geometry.nx());
    if first.dim() != expected || second.dim() != expected {
        return Err(SimError::input_validation(
            "FLATMAP.SHAPE",
            format!(
                "map pair shapes {:?}/{:?} do not match the {}x{} geometry",
                first.dim(),
                second.dim(),
                geometry.ny(),
                geometry.nx()
            ),
        ));
    }
    Ok(())
}
