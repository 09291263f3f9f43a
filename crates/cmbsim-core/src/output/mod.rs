//! Result persistence.
//!
//! Each saved run becomes two JSON files in the output directory:
//! `{run_id}_results.json` with the labelled spectra and
//! `{run_id}_params.json` with the parameter diff and options needed to
//! reproduce them. Existing files are never clobbered unless overwriting
//! is explicitly requested.

use crate::config::{ParamValue, ParameterSet, UserOptions};
use crate::domain::{SimError, SimResult};
use crate::sweep::{ResultTable, RunRecord};
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which completed runs to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveSelection {
    All,
    /// The first `n` runs in execution order.
    First(usize),
    /// `n` runs sampled without replacement.
    Random(usize),
    /// Explicit run ids; every id must exist in the table.
    Ids(Vec<String>),
}

impl Default for SaveSelection {
    fn default() -> Self {
        Self::All
    }
}

#[derive(Serialize)]
struct RunParamsFile<'a> {
    params: &'a ParameterSet,
    options: &'a UserOptions,
}

/// Resolves a selection against the table, in execution order for `All`
/// and `First` and sampled order for `Random`.
pub fn select_run_ids<R: Rng>(
    table: &ResultTable,
    selection: &SaveSelection,
    rng: &mut R,
) -> SimResult<Vec<String>> {
    let all: Vec<&str> = table.run_ids();
    match selection {
        SaveSelection::All => Ok(all.iter().map(|id| id.to_string()).collect()),
        SaveSelection::First(count) => {
            if *count > all.len() {
                warn!(requested = count, available = all.len(), "saving every run");
            }
            Ok(all
                .iter()
                .take(*count)
                .map(|id| id.to_string())
                .collect())
        }
        SaveSelection::Random(count) => {
            if *count > all.len() {
                return Err(SimError::input_validation(
                    "OUTPUT.SELECTION",
                    format!("cannot sample {count} runs from {}", all.len()),
                ));
            }
            Ok(all
                .choose_multiple(rng, *count)
                .map(|id| id.to_string())
                .collect())
        }
        SaveSelection::Ids(ids) => {
            for id in ids {
                if table.get(id).is_none() {
                    return Err(SimError::input_validation(
                        "OUTPUT.UNKNOWN_RUN",
                        format!("run id '{id}' is not in the result table"),
                    ));
                }
            }
            Ok(ids.clone())
        }
    }
}

/// Persists the selected runs, returning the paths written.
pub fn save_results<R: Rng>(
    table: &ResultTable,
    selection: &SaveSelection,
    out_dir: &Path,
    overwrite: bool,
    rng: &mut R,
) -> SimResult<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).map_err(|source| {
        SimError::io_system(
            "IO.DIR_CREATE",
            format!("failed to create output directory '{}': {}", out_dir.display(), source),
        )
    })?;

    let run_ids = select_run_ids(table, selection, rng)?;
    let mut written = Vec::with_capacity(run_ids.len() * 2);
    for run_id in &run_ids {
        let record = table
            .get(run_id)
            .ok_or_else(|| {
                SimError::internal("OUTPUT.TABLE", format!("selected run '{run_id}' vanished"))
            })?;

        let results_path = out_dir.join(format!("{run_id}_results.json"));
        let params_path = out_dir.join(format!("{run_id}_params.json"));
        if !overwrite {
            for path in [&results_path, &params_path] {
                if path.exists() {
                    return Err(SimError::io_system(
                        "IO.RESULT_COLLISION",
                        format!(
                            "'{}' already exists; pass overwrite to replace it",
                            path.display()
                        ),
                    ));
                }
            }
        }

        write_json(&results_path, &record.result)?;
        write_json(
            &params_path,
            &RunParamsFile {
                params: &record.parameter_diff,
                options: &record.options,
            },
        )?;
        written.push(results_path);
        written.push(params_path);
    }

    info!(runs = run_ids.len(), dir = %out_dir.display(), "saved results");
    Ok(written)
}

/// Persists a single assembled spectrum under the given file stem,
/// outside any sweep table. Same layout and collision rules as
/// [`save_results`].
pub fn save_single(
    result: &crate::spectrum::SpectrumResult,
    params: &ParameterSet,
    options: &UserOptions,
    out_dir: &Path,
    stem: &str,
    overwrite: bool,
) -> SimResult<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).map_err(|source| {
        SimError::io_system(
            "IO.DIR_CREATE",
            format!("failed to create output directory '{}': {}", out_dir.display(), source),
        )
    })?;

    let results_path = out_dir.join(format!("{stem}_results.json"));
    let params_path = out_dir.join(format!("{stem}_params.json"));
    if !overwrite {
        for path in [&results_path, &params_path] {
            if path.exists() {
                return Err(SimError::io_system(
                    "IO.RESULT_COLLISION",
                    format!(
                        "'{}' already exists; pass overwrite to replace it",
                        path.display()
                    ),
                ));
            }
        }
    }

    write_json(&results_path, result)?;
    write_json(&params_path, &RunParamsFile { params, options })?;
    info!(stem, dir = %out_dir.display(), "saved result");
    Ok(vec![results_path, params_path])
}

/// Human-readable file stem summarizing a run: the tensor-to-scalar ratio
/// (as its decade), the lensing amplitude, and the date, with a marker
/// when raw (unscaled) spectra were produced.
pub fn descriptive_stem(params: &ParameterSet, options: &UserOptions, date: NaiveDate) -> String {
    let r = params
        .get("init_power.r")
        .and_then(ParamValue::as_f64)
        .unwrap_or(0.0);
    let alens = params
        .get("alens")
        .and_then(ParamValue::as_f64)
        .unwrap_or(1.0);
    // log10 of a zero ratio would render as "-inf"
    let ratio_tag = if r > 0.0 {
        format!("lr{:.2}", r.log10())
    } else {
        "lr0".to_string()
    };
    let mut stem = format!("{ratio_tag}_A{alens:.2}_d{}", date.format("%y%m%d"));
    if options.raw_cl {
        stem.push_str("_rawCl");
    }
    stem
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> SimResult<()> {
    let encoded = serde_json::to_vec(value).map_err(|source| {
        SimError::internal("OUTPUT.ENCODE", format!("failed to encode results: {source}"))
    })?;
    let mut file = fs::File::create(path).map_err(|source| write_error(path, source))?;
    file.write_all(&encoded)
        .map_err(|source| write_error(path, source))
}

fn write_error(path: &Path, source: std::io::Error) -> SimError {
    SimError::io_system(
        "IO.RESULT_WRITE",
        format!("failed to write '{}': {}", path.display(), source),
    )
}

#[cfg(test)]
mod tests {
    use super::{descriptive_stem, save_results, select_run_ids, SaveSelection};
    use crate::config::{ParamValue, ParameterSet, UserOptions};
    use crate::spectrum::{SpectrumLabel, SpectrumResult};
    use crate::sweep::{ResultTable, RunRecord};
    use chrono::NaiveDate;
    use ndarray::Array1;

    fn table(run_ids: &[&str]) -> ResultTable {
        let mut table = ResultTable::default();
        for run_id in run_ids {
            let result = SpectrumResult {
                ell: Array1::from(vec![0.0, 1.0, 2.0]),
                columns: vec![(SpectrumLabel::ClTT, Array1::from(vec![0.0, 0.0, 42.0]))],
            };
            table.insert(
                run_id.to_string(),
                RunRecord {
                    result,
                    parameter_diff: ParameterSet::default(),
                    options: UserOptions::default(),
                },
            );
        }
        table
    }

    #[test]
    fn selection_modes_resolve_against_the_table() {
        let table = table(&["a", "b", "c"]);
        let mut rng = rand::thread_rng();

        let all = select_run_ids(&table, &SaveSelection::All, &mut rng).unwrap();
        assert_eq!(all, vec!["a", "b", "c"]);

        let first = select_run_ids(&table, &SaveSelection::First(2), &mut rng).unwrap();
        assert_eq!(first, vec!["a", "b"]);

        let random = select_run_ids(&table, &SaveSelection::Random(2), &mut rng).unwrap();
        assert_eq!(random.len(), 2);
        assert_ne!(random[0], random[1]);

        let error =
            select_run_ids(&table, &SaveSelection::Random(5), &mut rng).unwrap_err();
        assert_eq!(error.code(), "OUTPUT.SELECTION");

        let error = select_run_ids(
            &table,
            &SaveSelection::Ids(vec!["nope".to_string()]),
            &mut rng,
        )
        .unwrap_err();
        assert_eq!(error.code(), "OUTPUT.UNKNOWN_RUN");
    }

    #[test]
    fn saving_writes_a_result_and_params_file_per_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let table = table(&["runid_x"]);
        let mut rng = rand::thread_rng();

        let written = save_results(&table, &SaveSelection::All, dir.path(), false, &mut rng)
            .expect("save should succeed");
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("runid_x_results.json").is_file());
        assert!(dir.path().join("runid_x_params.json").is_file());

        let text = std::fs::read_to_string(dir.path().join("runid_x_results.json"))
            .expect("results file readable");
        let decoded: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(decoded["l"][2], 2.0);
        assert_eq!(decoded["clTT"][2], 42.0);
    }

    #[test]
    fn collisions_fail_unless_overwrite_is_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let table = table(&["runid_x"]);
        let mut rng = rand::thread_rng();

        save_results(&table, &SaveSelection::All, dir.path(), false, &mut rng)
            .expect("first save should succeed");
        let error = save_results(&table, &SaveSelection::All, dir.path(), false, &mut rng)
            .expect_err("second save should collide");
        assert_eq!(error.code(), "IO.RESULT_COLLISION");

        save_results(&table, &SaveSelection::All, dir.path(), true, &mut rng)
            .expect("overwrite should succeed");
    }

    #[test]
    fn stem_embeds_ratio_decade_amplitude_and_date() {
        let mut params = ParameterSet::baseline();
        params
            .set_path("init_power.r", ParamValue::Float(0.01))
            .unwrap();
        params.set_path("alens", ParamValue::Float(1.3)).unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 8, 26).expect("valid date");
        let stem = descriptive_stem(&params, &UserOptions::default(), date);
        assert_eq!(stem, "lr-2.00_A1.30_d260826");

        let raw = UserOptions {
            raw_cl: true,
            ..UserOptions::default()
        };
        assert_eq!(
            descriptive_stem(&params, &raw, date),
            "lr-2.00_A1.30_d260826_rawCl"
        );
    }

    #[test]
    fn stem_marks_a_zero_tensor_ratio_instead_of_minus_infinity() {
        let params = ParameterSet::baseline();
        let date = NaiveDate::from_ymd_opt(2026, 8, 26).expect("valid date");
        let stem = descriptive_stem(&params, &UserOptions::default(), date);
        assert_eq!(stem, "lr0_A1.00_d260826");
    }
}
