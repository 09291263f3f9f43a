//! Auxiliary user options: everything the spectrum assembly and output
//! stages need that is not a solver parameter.

use super::params::ParamValue;
use crate::domain::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which spectrum labels to assemble: the `all` keyword or an explicit
/// list such as `[clTT, clPP]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClSelection {
    Keyword(String),
    Labels(Vec<String>),
}

impl Default for ClSelection {
    fn default() -> Self {
        Self::Keyword("all".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserOptions {
    /// Noise model selector; `detector-white` is the supported value and
    /// absence means no noise.
    pub noise_type: Option<String>,
    pub noise_uk_arcmin: f64,
    pub beam_fwhm_arcmin: f64,
    /// User-requested multipole cap; the effective cap also honors the
    /// beam-derived cutoff.
    pub max_l_use: usize,
    /// Safety margin of multipoles computed beyond the usable cap and
    /// discarded afterwards; edge multipoles near the solver truncation
    /// point are unreliable.
    pub extra_l: usize,
    pub lmin: usize,
    /// Return raw C_l instead of l(l+1)/2pi-scaled spectra.
    pub raw_cl: bool,
    /// Return dimensionless temperature spectra instead of muK^2.
    pub dimensionless_tt: bool,
    pub cls_to_output: ClSelection,
    pub verbose: bool,
    pub outfile_dir: PathBuf,
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            noise_type: None,
            noise_uk_arcmin: 10.0,
            beam_fwhm_arcmin: 1.0,
            max_l_use: 10_000,
            extra_l: 100,
            lmin: 0,
            raw_cl: false,
            dimensionless_tt: false,
            cls_to_output: ClSelection::default(),
            verbose: false,
            outfile_dir: PathBuf::from("outfiles"),
        }
    }
}

impl UserOptions {
    /// True when `key` names one of the option fields addressable through
    /// [`crate::config::SimConfig::update`].
    pub fn has_key(&self, key: &str) -> bool {
        matches!(
            key,
            "noise_type"
                | "noise_uk_arcmin"
                | "beam_fwhm_arcmin"
                | "max_l_use"
                | "extra_l"
                | "lmin"
                | "raw_cl"
                | "dimensionless_tt"
                | "cls_to_output"
                | "verbose"
                | "outfile_dir"
        )
    }

    /// Typed assignment for the dual-namespace update path.
    pub fn set(&mut self, key: &str, value: &ParamValue) -> SimResult<()> {
        match key {
            "noise_type" => {
                self.noise_type = match value {
                    ParamValue::Str(text) => Some(text.clone()),
                    other => return Err(type_mismatch(key, "string", other)),
                };
            }
            "noise_uk_arcmin" => self.noise_uk_arcmin = require_f64(key, value)?,
            "beam_fwhm_arcmin" => self.beam_fwhm_arcmin = require_f64(key, value)?,
            "max_l_use" => self.max_l_use = require_usize(key, value)?,
            "extra_l" => self.extra_l = require_usize(key, value)?,
            "lmin" => self.lmin = require_usize(key, value)?,
            "raw_cl" => self.raw_cl = require_bool(key, value)?,
            "dimensionless_tt" => self.dimensionless_tt = require_bool(key, value)?,
            "cls_to_output" => {
                self.cls_to_output = match value {
                    ParamValue::Str(text) => ClSelection::Keyword(text.clone()),
                    other => return Err(type_mismatch(key, "string", other)),
                };
            }
            "verbose" => self.verbose = require_bool(key, value)?,
            "outfile_dir" => {
                self.outfile_dir = match value {
                    ParamValue::Str(text) => PathBuf::from(text),
                    other => return Err(type_mismatch(key, "string", other)),
                };
            }
            other => {
                return Err(SimError::input_validation(
                    "CONFIG.UNKNOWN_KEY",
                    format!("'{other}' is not a user option"),
                ));
            }
        }
        Ok(())
    }
}

fn require_f64(key: &str, value: &ParamValue) -> SimResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| type_mismatch(key, "number", value))
}

fn require_usize(key: &str, value: &ParamValue) -> SimResult<usize> {
    match value {
        ParamValue::Int(i) if *i >= 0 => Ok(*i as usize),
        other => Err(type_mismatch(key, "non-negative integer", other)),
    }
}

fn require_bool(key: &str, value: &ParamValue) -> SimResult<bool> {
    match value {
        ParamValue::Bool(b) => Ok(*b),
        other => Err(type_mismatch(key, "boolean", other)),
    }
}

fn type_mismatch(key: &str, expected: &str, actual: &ParamValue) -> SimError {
    SimError::input_validation(
        "CONFIG.TYPE_MISMATCH",
        format!("option '{key}' expects a {expected}, got '{actual}'"),
    )
}
