//! Square-map FFT helpers on top of `rustfft`.
//!
//! `rustfft` is one-dimensional, so the 2D transforms run each row and
//! each column through a planned FFT via a copy buffer; lanes of an
//! `ndarray` column are not contiguous, and the copy keeps both axes on
//! the same code path.

use ndarray::{Array2, Axis};
use num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

/// Forward 2D FFT of a real map.
pub fn fft2_real(map: &Array2<f64>) -> Array2<Complex64> {
    fft2(&map.mapv(|value| Complex64::new(value, 0.0)))
}

/// Forward 2D FFT, unnormalized (matching the usual DFT convention).
pub fn fft2(map: &Array2<Complex64>) -> Array2<Complex64> {
    transform2(map, FftDirection::Forward)
}

/// Inverse 2D FFT, normalized by the number of pixels so that
/// `ifft2(fft2(x)) == x`.
pub fn ifft2(map: &Array2<Complex64>) -> Array2<Complex64> {
    let scale = 1.0 / map.len() as f64;
    let mut out = transform2(map, FftDirection::Inverse);
    out.mapv_inplace(|value| value * scale);
    out
}

/// Moves the zero mode to the center of the map (and back again when
/// applied twice to even-sized maps).
pub fn fftshift2<T: Copy>(map: &Array2<T>) -> Array2<T> {
    let (rows, cols) = map.dim();
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        map[((i + rows / 2) % rows, (j + cols / 2) % cols)]
    })
}

fn transform2(map: &Array2<Complex64>, direction: FftDirection) -> Array2<Complex64> {
    let mut planner = FftPlanner::new();
    let mut data = map.clone();
    for axis in [Axis(1), Axis(0)] {
        transform_lanes(&mut data, axis, direction, &mut planner);
    }
    data
}

fn transform_lanes(
    data: &mut Array2<Complex64>,
    lane_axis: Axis,
    direction: FftDirection,
    planner: &mut FftPlanner<f64>,
) {
    let len = data.len_of(lane_axis);
    let fft = planner.plan_fft(len, direction);
    let mut buffer = vec![Complex64::new(0.0, 0.0); len];
    let mut scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];

    for mut lane in data.lanes_mut(lane_axis) {
        for (slot, value) in buffer.iter_mut().zip(lane.iter()) {
            *slot = *value;
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        for (value, slot) in lane.iter_mut().zip(buffer.iter()) {
            *value = *slot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fft2, fft2_real, fftshift2, ifft2};
    use ndarray::Array2;
    use num_complex::Complex64;

    #[test]
    fn constant_map_transforms_to_a_pure_zero_mode() {
        let map = Array2::from_elem((8, 8), 3.0);
        let transformed = fft2_real(&map);
        assert!((transformed[(0, 0)].re - 3.0 * 64.0).abs() < 1.0e-9);
        for ((i, j), value) in transformed.indexed_iter() {
            if (i, j) != (0, 0) {
                assert!(value.norm() < 1.0e-9, "leakage at ({i}, {j})");
            }
        }
    }

    #[test]
    fn inverse_transform_round_trips() {
        let map = Array2::from_shape_fn((16, 16), |(i, j)| {
            Complex64::new((i as f64 * 0.3).sin() + j as f64 * 0.01, 0.0)
        });
        let back = ifft2(&fft2(&map));
        for (original, recovered) in map.iter().zip(back.iter()) {
            assert!((original - recovered).norm() < 1.0e-10);
        }
    }

    #[test]
    fn shift_centers_the_zero_mode_and_is_an_involution() {
        let mut map = Array2::zeros((6, 6));
        map[(0, 0)] = 1.0;
        let shifted = fftshift2(&map);
        assert_eq!(shifted[(3, 3)], 1.0);
        assert_eq!(fftshift2(&shifted), map);
    }
}
