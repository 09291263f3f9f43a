//! Layered configuration resolution.
//!
//! Three sources are layered in increasing priority: the built-in baseline
//! parameter set, a base configuration file, and a user override file. The
//! user file additionally declares auxiliary options and the swept
//! parameter axes.

mod iterables;
mod options;
mod params;

pub use iterables::{expand_axes, SweepAxis};
pub use options::{ClSelection, UserOptions};
pub use params::{ApplyOutcome, ParamEntry, ParamValue, ParameterSet};

use crate::domain::{SimError, SimResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Which namespace an [`SimConfig::update`] call resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget {
    SolverParam,
    Option,
}

/// Fully resolved configuration: solver parameters, the baseline they are
/// diffed against, auxiliary user options, and the sweep axes.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub params: ParameterSet,
    baseline: ParameterSet,
    pub options: UserOptions,
    pub iterables: Vec<SweepAxis>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserConfigFile {
    #[serde(default)]
    options: UserOptions,
    #[serde(default)]
    solver: serde_yaml::Mapping,
    #[serde(default)]
    iterables: serde_yaml::Mapping,
}

impl SimConfig {
    /// Reads and layers the two configuration files.
    pub fn load(base_file: &Path, user_file: &Path) -> SimResult<Self> {
        let base_text = read_config_file(base_file)?;
        let user_text = read_config_file(user_file)?;
        Self::from_yaml_strs(&base_text, &user_text)
    }

    /// Layers two already-loaded YAML documents. The base document is a
    /// flat (or one-level-nested) mapping of solver parameters; the user
    /// document holds `options:`, `solver:` overrides, and `iterables:`.
    pub fn from_yaml_strs(base: &str, user: &str) -> SimResult<Self> {
        let base_doc: serde_yaml::Value = serde_yaml::from_str(base).map_err(|source| {
            SimError::input_validation(
                "CONFIG.BASE_PARSE",
                format!("base configuration is not valid YAML: {source}"),
            )
        })?;
        let base_mapping = match base_doc {
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            serde_yaml::Value::Mapping(mapping) => mapping,
            other => {
                return Err(SimError::input_validation(
                    "CONFIG.BASE_PARSE",
                    format!("base configuration must be a mapping, got {other:?}"),
                ));
            }
        };

        let user_doc: UserConfigFile = serde_yaml::from_str(user).map_err(|source| {
            SimError::input_validation(
                "CONFIG.USER_PARSE",
                format!("user configuration is not valid YAML: {source}"),
            )
        })?;

        let mut params = ParameterSet::baseline();
        warn_rejections("base configuration", &params.apply_mapping(&base_mapping));

        // the diff baseline is the state after the base file but before
        // user overrides, so overrides and sweep updates show up in diffs
        let baseline = params.clone();

        warn_rejections(
            "user solver overrides",
            &params.apply_mapping(&user_doc.solver),
        );

        let iterables = expand_axes(&user_doc.iterables)?;

        Ok(Self {
            params,
            baseline,
            options: user_doc.options,
            iterables,
        })
    }

    /// Updates a dotted path of at most two segments, resolving against
    /// the solver parameter set first and the user options second.
    pub fn update(&mut self, path: &str, value: ParamValue) -> SimResult<UpdateTarget> {
        if path.split('.').count() > 2 {
            return Err(SimError::input_validation(
                "CONFIG.PATH_DEPTH",
                format!("parameter path '{path}' exceeds the two-level limit"),
            ));
        }
        if self.params.contains_path(path) {
            self.params.set_path(path, value)?;
            return Ok(UpdateTarget::SolverParam);
        }
        if !path.contains('.') && self.options.has_key(path) {
            self.options.set(path, &value)?;
            return Ok(UpdateTarget::Option);
        }
        Err(SimError::input_validation(
            "CONFIG.UNKNOWN_KEY",
            format!("'{path}' names neither a solver parameter nor a user option"),
        ))
    }

    /// Minimal parameter set reproducing the current state from the
    /// baseline. Idempotent between updates.
    pub fn diff_against_baseline(&self) -> ParameterSet {
        self.params.diff(&self.baseline)
    }

    pub fn baseline(&self) -> &ParameterSet {
        &self.baseline
    }
}

fn read_config_file(path: &Path) -> SimResult<String> {
    fs::read_to_string(path).map_err(|source| {
        SimError::io_system(
            "IO.CONFIG_READ",
            format!("failed to read configuration '{}': {}", path.display(), source),
        )
    })
}

fn warn_rejections(layer: &str, outcome: &ApplyOutcome) {
    for (path, reason) in &outcome.rejected {
        warn!(layer, path = path.as_str(), reason = reason.as_str(), "ignoring configuration key");
    }
}
