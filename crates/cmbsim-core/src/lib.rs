//! Configuration-driven CMB power-spectrum sweep engine.
//!
//! The crate resolves layered YAML configuration into a cosmological
//! parameter set, enumerates the Cartesian product of swept parameters,
//! obtains theoretical angular power spectra from a pluggable Boltzmann
//! solver backend, augments them with an analytic instrument-noise model,
//! and persists selected runs to disk. A flat-sky utility module covers
//! 2D Fourier power binning and the E/B <-> Q/U spin-2 rotation.

pub mod config;
pub mod constants;
pub mod domain;
pub mod flatmap;
pub mod noise;
pub mod output;
pub mod solver;
pub mod spectrum;
pub mod sweep;
