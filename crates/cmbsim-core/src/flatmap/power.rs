//! 2D power maps and isotropic power-spectrum estimation.

use super::fft::{fft2_real, fftshift2};
use super::FlatMapGeometry;
use crate::domain::{SimError, SimResult};
use ndarray::{Array1, Array2};

/// `|FFT|^2 * tfac^2`: the 2D power of a real map in sky units, in
/// unshifted FFT ordering (zero mode at the corner).
pub fn power_map_2d(map: &Array2<f64>, geometry: &FlatMapGeometry) -> SimResult<Array2<f64>> {
    check_shape(map, geometry)?;
    let tfac2 = geometry.tfac() * geometry.tfac();
    Ok(fft2_real(map).mapv(|value| value.norm_sqr() * tfac2))
}

/// Histogram-binned isotropic power spectrum of a real map.
///
/// The shifted 2D power is accumulated into `n_bins - 1` equal-width
/// multipole annuli spanning `0..peak_ell` and averaged per bin; empty
/// bins (and the corner modes beyond `peak_ell`) contribute zero. Returns
/// the bin centers and the per-bin mean power.
pub fn bin_power_spectrum(
    map: &Array2<f64>,
    geometry: &FlatMapGeometry,
    n_bins: usize,
) -> SimResult<(Array1<f64>, Array1<f64>)> {
    if n_bins < 2 {
        return Err(SimError::input_validation(
            "FLATMAP.BINS",
            format!("power-spectrum binning needs at least 2 bin edges, got {n_bins}"),
        ));
    }
    let power = fftshift2(&power_map_2d(map, geometry)?);

    let (ny, nx) = (geometry.ny(), geometry.nx());
    let peak = geometry.peak_ell();
    let bins = n_bins - 1;
    let bin_width = peak / bins as f64;

    // multipole coordinates of shifted indices; the zero mode sits at
    // (ny/2, nx/2)
    let row_ell = |i: usize| (i as f64 - (ny / 2) as f64) * geometry.delta_ell_y();
    let col_ell = |j: usize| (j as f64 - (nx / 2) as f64) * geometry.delta_ell();

    let mut sums = vec![0.0; bins];
    let mut counts = vec![0usize; bins];
    for ((i, j), value) in power.indexed_iter() {
        let ell = col_ell(j).hypot(row_ell(i));
        if ell > peak {
            continue;
        }
        let bin = ((ell / bin_width) as usize).min(bins - 1);
        sums[bin] += value;
        counts[bin] += 1;
    }

    let centers = Array1::from_iter((0..bins).map(|bin| (bin as f64 + 0.5) * bin_width));
    let means = Array1::from_iter(sums.iter().zip(&counts).map(|(sum, &count)| {
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }));
    Ok((centers, means))
}

fn check_shape(map: &Array2<f64>, geometry: &FlatMapGeometry) -> SimResult<()> {
    if map.dim() != (geometry.ny(), geometry.nx()) {
        return Err(SimError::input_validation(
            "FLATMAP.SHAPE",
            format!(
                "map shape {:?} does not match the {}x{} geometry",
                map.dim(),
                geometry.ny(),
                geometry.nx()
            ),
        ));
    }
    Ok(())
}
