//! Spectrum assembly: one resolved configuration in, one labelled set of
//! power spectra out.
//!
//! The assembler asks the solver for more multipoles than it returns
//! (`extra_l` beyond the usable cap) because spectra near the solver's
//! truncation point are unreliable, then adds instrument noise and trims
//! to the requested multipole window.

use crate::config::{ClSelection, SimConfig, UserOptions};
use crate::noise::{detector_white_noise, max_multipole, NoiseKind};
use crate::solver::{BoltzmannSolver, SolverFlags, SolverSpectra};
use crate::domain::{SimError, SimResult};
use ndarray::{s, Array1};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::time::Instant;
use tracing::{debug, info};

/// Fudge factor applied to the beam-derived multipole cutoff.
const BEAM_CUTOFF_FACTOR: f64 = 3.0;

/// The spectra the assembler can produce, in canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumLabel {
    ClTT,
    ClEE,
    ClBB,
    ClTE,
    ClPP,
    ClPT,
    ClPE,
}

impl SpectrumLabel {
    pub const ALL: [Self; 7] = [
        Self::ClTT,
        Self::ClEE,
        Self::ClBB,
        Self::ClTE,
        Self::ClPP,
        Self::ClPT,
        Self::ClPE,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClTT => "clTT",
            Self::ClEE => "clEE",
            Self::ClBB => "clBB",
            Self::ClTE => "clTE",
            Self::ClPP => "clPP",
            Self::ClPT => "clPT",
            Self::ClPE => "clPE",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.as_str() == label)
    }

    /// True for the channels that receive instrument noise; TT gets the
    /// temperature level and the rest the polarization level.
    fn noise_channel(self) -> Option<bool> {
        match self {
            Self::ClTT => Some(true),
            Self::ClEE | Self::ClBB | Self::ClTE => Some(false),
            Self::ClPP | Self::ClPT | Self::ClPE => None,
        }
    }
}

/// Assembled spectra over `l = lmin..=max_l_use`, keyed by label in the
/// order they were requested. Serializes as a mapping with an `l` column
/// first, so results are self-describing on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumResult {
    pub ell: Array1<f64>,
    pub columns: Vec<(SpectrumLabel, Array1<f64>)>,
}

impl SpectrumResult {
    pub fn column(&self, label: SpectrumLabel) -> Option<&Array1<f64>> {
        self.columns
            .iter()
            .find(|(have, _)| *have == label)
            .map(|(_, values)| values)
    }
}

impl Serialize for SpectrumResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len() + 1))?;
        map.serialize_entry("l", &self.ell.to_vec())?;
        for (label, values) in &self.columns {
            map.serialize_entry(label.as_str(), &values.to_vec())?;
        }
        map.end()
    }
}

/// Drives one solver invocation and the noise/trim post-processing.
pub struct SpectrumAssembler<'a, S: BoltzmannSolver + ?Sized> {
    solver: &'a S,
}

impl<'a, S: BoltzmannSolver + ?Sized> SpectrumAssembler<'a, S> {
    pub fn new(solver: &'a S) -> Self {
        Self { solver }
    }

    /// The usable multipole cap: the configured cap, further limited by
    /// what the beam can resolve.
    pub fn effective_max_l_use(options: &UserOptions) -> usize {
        let beam_cap = max_multipole(options.beam_fwhm_arcmin, BEAM_CUTOFF_FACTOR).floor() as usize;
        options.max_l_use.min(beam_cap)
    }

    /// Temperature and polarization noise power over `l = 0..=lmax`, per
    /// the configured noise model. Zero arrays when noise is off.
    pub fn noise_pair(options: &UserOptions, lmax: usize) -> (Array1<f64>, Array1<f64>) {
        match NoiseKind::parse(options.noise_type.as_deref()) {
            NoiseKind::DetectorWhite => {
                let units_uk = !options.dimensionless_tt;
                (
                    detector_white_noise(
                        options.noise_uk_arcmin,
                        options.beam_fwhm_arcmin,
                        lmax,
                        true,
                        units_uk,
                    ),
                    detector_white_noise(
                        options.noise_uk_arcmin,
                        options.beam_fwhm_arcmin,
                        lmax,
                        false,
                        units_uk,
                    ),
                )
            }
            NoiseKind::None => (Array1::zeros(lmax + 1), Array1::zeros(lmax + 1)),
        }
    }

    pub fn assemble(&self, config: &SimConfig) -> SimResult<SpectrumResult> {
        let options = &config.options;
        let started = Instant::now();

        let max_l_use = Self::effective_max_l_use(options);
        if options.lmin > max_l_use {
            return Err(SimError::input_validation(
                "SPECTRUM.EMPTY_RANGE",
                format!(
                    "lmin {} exceeds the usable multipole cap {}",
                    options.lmin, max_l_use
                ),
            ));
        }
        let max_l_calc = max_l_use + options.extra_l;

        let flags = SolverFlags {
            raw_cl: options.raw_cl,
            dimensionless_tt: options.dimensionless_tt,
        };
        let spectra = self.solver.compute(&config.params, max_l_calc, flags)?;
        if spectra.rows() < max_l_use + 1 {
            return Err(SimError::computation(
                "RUN.SOLVER_RANGE",
                format!(
                    "solver returned {} multipoles, {} required",
                    spectra.rows(),
                    max_l_use + 1
                ),
            ));
        }

        let labels = requested_labels(&options.cls_to_output)?;
        let (tt_noise, pol_noise) = Self::noise_pair(options, max_l_use);

        let lmin = options.lmin;
        let mut columns = Vec::with_capacity(labels.len());
        for label in labels {
            let mut values = extract_column(&spectra, label, max_l_use);
            match label.noise_channel() {
                Some(true) => values += &tt_noise,
                Some(false) => values += &pol_noise,
                None => {}
            }
            columns.push((label, values.slice(s![lmin..]).to_owned()));
        }

        let ell = Array1::from_iter((lmin..=max_l_use).map(|l| l as f64));
        debug!(max_l_use, max_l_calc, lmin, "assembled spectra");
        if options.verbose {
            info!(elapsed = ?started.elapsed(), max_l_use, "spectrum assembly finished");
        }

        Ok(SpectrumResult { ell, columns })
    }
}

fn requested_labels(selection: &ClSelection) -> SimResult<Vec<SpectrumLabel>> {
    match selection {
        ClSelection::Keyword(keyword) if keyword == "all" => Ok(SpectrumLabel::ALL.to_vec()),
        ClSelection::Keyword(other) => match SpectrumLabel::parse(other) {
            Some(label) => Ok(vec![label]),
            None => Err(unknown_label(other)),
        },
        ClSelection::Labels(labels) => labels
            .iter()
            .map(|label| SpectrumLabel::parse(label).ok_or_else(|| unknown_label(label)))
            .collect(),
    }
}

fn unknown_label(label: &str) -> SimError {
    SimError::input_validation(
        "SPECTRUM.UNKNOWN_LABEL",
        format!("'{label}' is not an available spectrum (choose from clTT, clEE, clBB, clTE, clPP, clPT, clPE, or 'all')"),
    )
}

fn extract_column(spectra: &SolverSpectra, label: SpectrumLabel, max_l_use: usize) -> Array1<f64> {
    let (block, column) = match label {
        SpectrumLabel::ClTT => (&spectra.total, SolverSpectra::COL_TT),
        SpectrumLabel::ClEE => (&spectra.total, SolverSpectra::COL_EE),
        SpectrumLabel::ClBB => (&spectra.total, SolverSpectra::COL_BB),
        SpectrumLabel::ClTE => (&spectra.total, SolverSpectra::COL_TE),
        SpectrumLabel::ClPP => (&spectra.lens_potential, SolverSpectra::COL_PP),
        SpectrumLabel::ClPT => (&spectra.lens_potential, SolverSpectra::COL_PT),
        SpectrumLabel::ClPE => (&spectra.lens_potential, SolverSpectra::COL_PE),
    };
    block.slice(s![..=max_l_use, column]).to_owned()
}
