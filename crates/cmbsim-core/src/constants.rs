//! Shared physical constants.

/// One arcminute in radians.
pub const ARCMIN_TO_RAD: f64 = std::f64::consts::PI / 180.0 / 60.0;

/// One degree in radians.
pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// CMB monopole temperature in microkelvin, used to convert between
/// muK^2 and dimensionless spectra.
pub const T_CMB_UK: f64 = 2.72548e6;

#[cfg(test)]
mod tests {
    use super::{ARCMIN_TO_RAD, DEG_TO_RAD, T_CMB_UK};

    #[test]
    fn arcminute_is_one_sixtieth_of_a_degree() {
        assert!((ARCMIN_TO_RAD * 60.0 - DEG_TO_RAD).abs() < 1.0e-18);
    }

    #[test]
    fn cmb_monopole_is_in_microkelvin() {
        assert!((T_CMB_UK / 1.0e6 - 2.72548).abs() < 1.0e-12);
    }
}
