//! Replay backend over a precomputed spectra table.
//!
//! The table is whitespace-delimited with one row per multipole and the
//! columns `l TT EE BB TE PP PT PE`, in the conventional solver output
//! scaling: TT/EE/BB/TE carry `l(l+1)/2pi` in muK^2, PP carries
//! `[l(l+1)]^2/2pi`, and PT/PE carry `[l(l+1)]^{3/2}/2pi`. Solvers start
//! their tables at l=2; rows below the table's first multipole are
//! zero-filled on output.

use super::{BoltzmannSolver, SolverFlags, SolverSpectra};
use crate::config::ParameterSet;
use crate::constants::T_CMB_UK;
use crate::domain::{SimError, SimResult};
use ndarray::Array2;
use std::f64::consts::TAU;
use std::fs;
use std::path::Path;

const TABLE_COLUMNS: usize = 8;

#[derive(Debug, Clone)]
pub struct TabulatedSolver {
    first_l: usize,
    /// Rows `first_l..=last_l`, columns TT EE BB TE.
    total: Array2<f64>,
    /// Rows `first_l..=last_l`, columns PP PT PE.
    lens_potential: Array2<f64>,
}

impl TabulatedSolver {
    pub fn from_file(path: &Path) -> SimResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| {
            SimError::io_system(
                "IO.TABLE_READ",
                format!("failed to read spectra table '{}': {}", path.display(), source),
            )
        })?;
        Self::from_table_str(&text)
    }

    pub fn from_table_str(text: &str) -> SimResult<Self> {
        let mut rows: Vec<[f64; TABLE_COLUMNS]> = Vec::new();
        for (line_number, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<f64> = trimmed
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|source| table_parse_error(line_number, format!("{source}")))?;
            if fields.len() != TABLE_COLUMNS {
                return Err(table_parse_error(
                    line_number,
                    format!("expected {TABLE_COLUMNS} columns, found {}", fields.len()),
                ));
            }
            let mut row = [0.0; TABLE_COLUMNS];
            row.copy_from_slice(&fields);
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(SimError::input_validation(
                "SOLVER.TABLE_PARSE",
                "spectra table contains no data rows",
            ));
        }

        let first_l = rows[0][0] as usize;
        for (offset, row) in rows.iter().enumerate() {
            if row[0] as usize != first_l + offset {
                return Err(SimError::input_validation(
                    "SOLVER.TABLE_PARSE",
                    format!(
                        "multipole column must be contiguous; expected l={}, found l={}",
                        first_l + offset,
                        row[0]
                    ),
                ));
            }
        }

        let mut total = Array2::zeros((rows.len(), 4));
        let mut lens_potential = Array2::zeros((rows.len(), 3));
        for (index, row) in rows.iter().enumerate() {
            for column in 0..4 {
                total[(index, column)] = row[1 + column];
            }
            for column in 0..3 {
                lens_potential[(index, column)] = row[5 + column];
            }
        }

        Ok(Self {
            first_l,
            total,
            lens_potential,
        })
    }

    /// Largest multipole the table can serve.
    pub fn last_l(&self) -> usize {
        self.first_l + self.total.nrows() - 1
    }
}

impl BoltzmannSolver for TabulatedSolver {
    fn compute(
        &self,
        _params: &ParameterSet,
        max_l: usize,
        flags: SolverFlags,
    ) -> SimResult<SolverSpectra> {
        if max_l > self.last_l() {
            return Err(SimError::computation(
                "RUN.SOLVER_RANGE",
                format!(
                    "spectra table ends at l={} but l={} was requested",
                    self.last_l(),
                    max_l
                ),
            ));
        }

        let mut total = Array2::zeros((max_l + 1, 4));
        let mut lens_potential = Array2::zeros((max_l + 1, 3));
        for ell in self.first_l..=max_l {
            let row = ell - self.first_l;
            let ell_f = ell as f64;
            // the conventional scaling zeroes the monopole row, so there
            // is no raw C_0 to recover; leave it zero
            if flags.raw_cl && ell == 0 {
                continue;
            }
            let cl_scale = ell_f * (ell_f + 1.0) / TAU;
            let potential_scale = cl_scale * ell_f * (ell_f + 1.0);
            let cross_scale = cl_scale * (ell_f * (ell_f + 1.0)).sqrt();

            for column in 0..4 {
                let mut value = self.total[(row, column)];
                if flags.raw_cl {
                    value /= cl_scale;
                }
                if flags.dimensionless_tt {
                    // TT/EE/BB are muK^2, TE is muK
                    value /= if column == SolverSpectra::COL_TE {
                        T_CMB_UK
                    } else {
                        T_CMB_UK * T_CMB_UK
                    };
                }
                total[(ell, column)] = value;
            }
            for column in 0..3 {
                let mut value = self.lens_potential[(row, column)];
                if flags.raw_cl {
                    value /= if column == SolverSpectra::COL_PP {
                        potential_scale
                    } else {
                        cross_scale
                    };
                }
                lens_potential[(ell, column)] = value;
            }
        }

        Ok(SolverSpectra {
            total,
            lens_potential,
        })
    }
}

fn table_parse_error(line_number: usize, detail: String) -> SimError {
    SimError::input_validation(
        "SOLVER.TABLE_PARSE",
        format!("spectra table line {}: {detail}", line_number + 1),
    )
}

#[cfg(test)]
mod tests {
    use super::{BoltzmannSolver, SolverFlags, SolverSpectra, TabulatedSolver};
    use crate::config::ParameterSet;
    use crate::constants::T_CMB_UK;
    use std::f64::consts::TAU;

    const TABLE: &str = "\
# l TT EE BB TE PP PT PE
2 100.0 4.0 0.4 8.0 1.0e-8 2.0e-8 3.0e-9
3 90.0 3.5 0.3 7.0 0.9e-8 1.8e-8 2.7e-9
4 80.0 3.0 0.2 6.0 0.8e-8 1.6e-8 2.4e-9
";

    fn solver() -> TabulatedSolver {
        TabulatedSolver::from_table_str(TABLE).expect("table should parse")
    }

    #[test]
    fn rows_below_the_table_start_are_zero_filled() {
        let spectra = solver()
            .compute(&ParameterSet::baseline(), 4, SolverFlags::default())
            .expect("compute should succeed");
        assert_eq!(spectra.rows(), 5);
        assert_eq!(spectra.total[(0, SolverSpectra::COL_TT)], 0.0);
        assert_eq!(spectra.total[(1, SolverSpectra::COL_TT)], 0.0);
        assert_eq!(spectra.total[(2, SolverSpectra::COL_TT)], 100.0);
        assert_eq!(spectra.lens_potential[(4, SolverSpectra::COL_PP)], 0.8e-8);
    }

    #[test]
    fn requesting_beyond_the_table_is_a_computation_error() {
        let error = solver()
            .compute(&ParameterSet::baseline(), 10, SolverFlags::default())
            .expect_err("short table should fail");
        assert_eq!(error.code(), "RUN.SOLVER_RANGE");
    }

    #[test]
    fn raw_cl_removes_the_solver_scaling() {
        let flags = SolverFlags {
            raw_cl: true,
            dimensionless_tt: false,
        };
        let spectra = solver()
            .compute(&ParameterSet::baseline(), 2, flags)
            .expect("compute should succeed");

        let cl_scale = 2.0 * 3.0 / TAU;
        assert!((spectra.total[(2, SolverSpectra::COL_TT)] - 100.0 / cl_scale).abs() < 1.0e-12);

        let potential_scale = cl_scale * 6.0;
        assert!(
            (spectra.lens_potential[(2, SolverSpectra::COL_PP)] - 1.0e-8 / potential_scale).abs()
                < 1.0e-20
        );

        let cross_scale = cl_scale * 6.0_f64.sqrt();
        assert!(
            (spectra.lens_potential[(2, SolverSpectra::COL_PT)] - 2.0e-8 / cross_scale).abs()
                < 1.0e-20
        );
    }

    #[test]
    fn dimensionless_mode_divides_by_the_monopole_temperature() {
        let flags = SolverFlags {
            raw_cl: false,
            dimensionless_tt: true,
        };
        let spectra = solver()
            .compute(&ParameterSet::baseline(), 2, flags)
            .expect("compute should succeed");

        let t2 = T_CMB_UK * T_CMB_UK;
        assert!((spectra.total[(2, SolverSpectra::COL_TT)] - 100.0 / t2).abs() < 1.0e-24);
        assert!((spectra.total[(2, SolverSpectra::COL_TE)] - 8.0 / T_CMB_UK).abs() < 1.0e-18);
        // lensing-potential spectra stay dimensionless either way
        assert_eq!(spectra.lens_potential[(2, SolverSpectra::COL_PP)], 1.0e-8);
    }

    #[test]
    fn raw_cl_leaves_a_zero_monopole_row_finite() {
        let table = "\
0 0.0 0.0 0.0 0.0 0.0 0.0 0.0
1 6.0 0.6 0.06 1.2 1.0e-9 2.0e-9 3.0e-10
2 100.0 4.0 0.4 8.0 1.0e-8 2.0e-8 3.0e-9
";
        let solver = TabulatedSolver::from_table_str(table).expect("table should parse");
        let flags = SolverFlags {
            raw_cl: true,
            dimensionless_tt: false,
        };
        let spectra = solver
            .compute(&ParameterSet::baseline(), 2, flags)
            .expect("compute should succeed");

        assert!(spectra.total.iter().all(|value| value.is_finite()));
        assert!(spectra.lens_potential.iter().all(|value| value.is_finite()));
        assert_eq!(spectra.total[(0, SolverSpectra::COL_TT)], 0.0);

        let cl_scale_1 = 1.0 * 2.0 / TAU;
        assert!((spectra.total[(1, SolverSpectra::COL_TT)] - 6.0 / cl_scale_1).abs() < 1.0e-12);
    }

    #[test]
    fn non_contiguous_multipoles_are_rejected() {
        let error = TabulatedSolver::from_table_str("2 1 1 1 1 1 1 1\n5 1 1 1 1 1 1 1\n")
            .expect_err("gap in multipoles should fail");
        assert_eq!(error.code(), "SOLVER.TABLE_PARSE");
    }
}
