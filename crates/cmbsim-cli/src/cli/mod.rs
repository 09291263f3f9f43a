mod commands;
mod helpers;

use clap::Parser;
use cmbsim_core::domain::SimError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_sim_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            diagnostic.exit_code()
        }
    }
}

/// Test entry point: runs the CLI against an explicit argument list
/// (without the program name).
pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("cmbsim".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    // a second init in the same process (tests) is fine to ignore
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(name = "cmbsim", about = "Config-driven CMB power-spectrum sweeps", version)]
struct Cli {
    /// Enable debug-level diagnostics
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run the configured parameter sweep and save its results
    Sweep(commands::SweepArgs),
    /// Assemble one spectrum at a single parameter point
    Spectrum(commands::SpectrumArgs),
    /// Print the analytic detector-noise curves as JSON
    Noise(commands::NoiseArgs),
}

fn dispatch_parsed(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        CliCommand::Sweep(args) => commands::run_sweep_command(args, cli.verbose),
        CliCommand::Spectrum(args) => commands::run_spectrum_command(args, cli.verbose),
        CliCommand::Noise(args) => commands::run_noise_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(SimError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<SimError> for CliError {
    fn from(error: SimError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_sim_error(&self) -> SimError {
        match self {
            Self::Usage(message) => SimError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => SimError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
