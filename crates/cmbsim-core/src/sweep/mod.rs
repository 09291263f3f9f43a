//! Parameter-sweep driver.
//!
//! A sweep takes the cartesian product of the configured axes in their
//! declaration order, with the last axis varying fastest, and assembles
//! one spectrum per grid point. The driver mutates its configuration in
//! place while stepping, so sweep state never leaks anywhere else.

use crate::config::{ParameterSet, SimConfig, SweepAxis, UserOptions};
use crate::domain::SimResult;
use crate::solver::BoltzmannSolver;
use crate::spectrum::{SpectrumAssembler, SpectrumResult};
use chrono::Local;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

/// Fresh run identifier: a local timestamp to microsecond precision plus
/// six random digits, so ids stay unique across rapid and concurrent
/// sweeps.
pub fn generate_run_id<R: Rng>(rng: &mut R) -> String {
    let stamp = Local::now().format("%y%m%d%H%M%S%6f");
    let suffix: String = (0..6).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect();
    format!("runid_{stamp}_{suffix}")
}

/// One completed sweep point: its spectra plus everything needed to
/// reproduce it.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub result: SpectrumResult,
    /// The solver parameters that differ from the baseline at this point.
    pub parameter_diff: ParameterSet,
    pub options: UserOptions,
}

/// Completed runs keyed by run id, in execution order.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    records: Vec<(String, RunRecord)>,
}

impl ResultTable {
    pub fn insert(&mut self, run_id: String, record: RunRecord) {
        self.records.push((run_id, record));
    }

    pub fn get(&self, run_id: &str) -> Option<&RunRecord> {
        self.records
            .iter()
            .find(|(id, _)| id == run_id)
            .map(|(_, record)| record)
    }

    pub fn run_ids(&self) -> Vec<&str> {
        self.records.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RunRecord)> {
        self.records
            .iter()
            .map(|(id, record)| (id.as_str(), record))
    }
}

/// Steps a configuration through its sweep axes, assembling a spectrum at
/// every grid point.
pub struct SweepDriver<'a, S: BoltzmannSolver + ?Sized> {
    solver: &'a S,
    config: SimConfig,
}

impl<'a, S: BoltzmannSolver + ?Sized> SweepDriver<'a, S> {
    pub fn new(solver: &'a S, config: SimConfig) -> Self {
        Self { solver, config }
    }

    /// Runs the full cartesian product. A configuration without iterables
    /// is a single-point sweep.
    pub fn run(&mut self) -> SimResult<ResultTable> {
        let axes = self.config.iterables.clone();
        let grid_points: usize = axes.iter().map(|axis| axis.values.len()).product();
        info!(
            axes = axes.len(),
            grid_points,
            "starting sweep"
        );

        let assembler = SpectrumAssembler::new(self.solver);
        let mut rng = rand::thread_rng();
        let mut table = ResultTable::default();
        if grid_points == 0 && !axes.is_empty() {
            info!("a sweep axis expanded to no values; nothing to run");
            return Ok(table);
        }
        let mut odometer = vec![0usize; axes.len()];

        loop {
            for (axis, &index) in axes.iter().zip(&odometer) {
                self.config
                    .update(&axis.path, axis.values[index].clone())?;
            }

            let result = assembler.assemble(&self.config)?;
            let run_id = generate_run_id(&mut rng);
            debug!(run_id = run_id.as_str(), "sweep point finished");
            table.insert(
                run_id,
                RunRecord {
                    result,
                    parameter_diff: self.config.diff_against_baseline(),
                    options: self.config.options.clone(),
                },
            );

            if !advance(&mut odometer, &axes) {
                break;
            }
        }

        info!(runs = table.len(), "sweep finished");
        Ok(table)
    }

    /// The configuration in its post-sweep state (each axis at its last
    /// value).
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

/// Advances the index vector with the last axis fastest; false once the
/// product is exhausted.
fn advance(odometer: &mut [usize], axes: &[SweepAxis]) -> bool {
    for position in (0..odometer.len()).rev() {
        odometer[position] += 1;
        if odometer[position] < axes[position].values.len() {
            return true;
        }
        odometer[position] = 0;
    }
    false
}
