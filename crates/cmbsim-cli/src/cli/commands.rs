use super::helpers::{parse_set_override, sampling_rng};
use super::CliError;
use chrono::Local;
use cmbsim_core::config::SimConfig;
use cmbsim_core::noise::detector_white_noise;
use cmbsim_core::output::{descriptive_stem, save_results, save_single, SaveSelection};
use cmbsim_core::solver::TabulatedSolver;
use cmbsim_core::spectrum::SpectrumAssembler;
use cmbsim_core::sweep::SweepDriver;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct ConfigArgs {
    /// Base configuration YAML (solver parameters)
    #[arg(long, default_value = "config/base_config.yaml")]
    base_config: PathBuf,

    /// User configuration YAML (options, overrides, iterables)
    #[arg(long, default_value = "config/user_config.yaml")]
    user_config: PathBuf,

    /// Precomputed spectra table the solver replays
    #[arg(long)]
    spectra_table: PathBuf,

    /// Output directory; defaults to the configured outfile_dir
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Replace existing result files instead of failing
    #[arg(long)]
    overwrite: bool,

    /// Emit raw C_l instead of the conventional scaled spectra
    #[arg(long)]
    raw_cl: bool,

    /// Emit dimensionless temperature spectra instead of muK^2
    #[arg(long)]
    dimensionless_tt: bool,
}

impl ConfigArgs {
    fn load(&self, verbose: bool) -> Result<SimConfig, CliError> {
        let mut config = SimConfig::load(&self.base_config, &self.user_config)?;
        if self.raw_cl {
            config.options.raw_cl = true;
        }
        if self.dimensionless_tt {
            config.options.dimensionless_tt = true;
        }
        if verbose {
            config.options.verbose = true;
        }
        if let Some(outdir) = &self.outdir {
            config.options.outfile_dir = outdir.clone();
        }
        Ok(config)
    }
}

#[derive(clap::Args)]
pub(super) struct SweepArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Save only the first N runs
    #[arg(long, value_name = "N", conflicts_with = "save_random")]
    save_first: Option<usize>,

    /// Save N runs sampled without replacement
    #[arg(long, value_name = "N")]
    save_random: Option<usize>,

    /// Seed for the save-sampling RNG, for reproducible selections
    #[arg(long)]
    seed: Option<u64>,
}

pub(super) fn run_sweep_command(args: SweepArgs, verbose: bool) -> Result<i32, CliError> {
    let config = args.config.load(verbose)?;
    let solver = TabulatedSolver::from_file(&args.config.spectra_table)?;

    let mut driver = SweepDriver::new(&solver, config);
    let table = driver.run().map_err(CliError::Compute)?;

    let selection = match (args.save_first, args.save_random) {
        (Some(count), _) => SaveSelection::First(count),
        (None, Some(count)) => SaveSelection::Random(count),
        (None, None) => SaveSelection::All,
    };
    let out_dir = driver.config().options.outfile_dir.clone();
    let mut rng = sampling_rng(args.seed);
    let written = save_results(
        &table,
        &selection,
        &out_dir,
        args.config.overwrite,
        &mut rng,
    )?;

    info!(
        runs = table.len(),
        files = written.len(),
        dir = %out_dir.display(),
        "sweep complete"
    );
    println!(
        "{} runs, {} files written to {}",
        table.len(),
        written.len(),
        out_dir.display()
    );
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct SpectrumArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Parameter or option override, as path=value (repeatable)
    #[arg(long = "set", value_name = "PATH=VALUE")]
    overrides: Vec<String>,
}

pub(super) fn run_spectrum_command(args: SpectrumArgs, verbose: bool) -> Result<i32, CliError> {
    let mut config = args.config.load(verbose)?;
    for raw in &args.overrides {
        let (path, value) = parse_set_override(raw)?;
        config.update(&path, value)?;
    }

    let solver = TabulatedSolver::from_file(&args.config.spectra_table)?;
    let result = SpectrumAssembler::new(&solver).assemble(&config)?;

    let stem = descriptive_stem(&config.params, &config.options, Local::now().date_naive());
    let out_dir = config.options.outfile_dir.clone();
    let written = save_single(
        &result,
        &config.diff_against_baseline(),
        &config.options,
        &out_dir,
        &stem,
        args.config.overwrite,
    )?;

    for path in &written {
        println!("{}", path.display());
    }
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct NoiseArgs {
    /// White-noise level in muK-arcmin
    #[arg(long, default_value_t = 10.0)]
    noise_uk_arcmin: f64,

    /// Gaussian beam FWHM in arcmin
    #[arg(long, default_value_t = 1.0)]
    beam_fwhm_arcmin: f64,

    /// Highest multipole to evaluate
    #[arg(long, default_value_t = 10_000)]
    lmax: usize,

    /// Emit dimensionless noise power instead of muK^2
    #[arg(long)]
    dimensionless: bool,
}

#[derive(Serialize)]
struct NoiseCurves {
    l: Vec<f64>,
    tt: Vec<f64>,
    pol: Vec<f64>,
}

pub(super) fn run_noise_command(args: NoiseArgs) -> Result<i32, CliError> {
    let units_uk = !args.dimensionless;
    let tt = detector_white_noise(
        args.noise_uk_arcmin,
        args.beam_fwhm_arcmin,
        args.lmax,
        true,
        units_uk,
    );
    let pol = detector_white_noise(
        args.noise_uk_arcmin,
        args.beam_fwhm_arcmin,
        args.lmax,
        false,
        units_uk,
    );

    let curves = NoiseCurves {
        l: (0..=args.lmax).map(|ell| ell as f64).collect(),
        tt: tt.to_vec(),
        pol: pol.to_vec(),
    };
    let encoded = serde_json::to_string(&curves)
        .map_err(|source| CliError::Internal(anyhow::anyhow!("encoding noise curves: {source}")))?;
    println!("{encoded}");
    Ok(0)
}
