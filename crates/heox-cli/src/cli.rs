use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "HEO-X CLI - Hybrid Monte Carlo sampling of high-entropy oxides on a crystal lattice.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a hybrid Monte Carlo simulation described by a TOML configuration file.
    Run(RunArgs),
    /// Generate a randomly ordered bulk oxide lattice and write it as extended XYZ.
    Build(BuildArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the simulation configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Write the final configuration to this extended XYZ file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Override the number of outer steps from the config file.
    #[arg(short = 'n', long, value_name = "INT")]
    pub steps: Option<u64>,

    /// Override the random seed from the config file.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the trajectory file from the config file.
    #[arg(long, value_name = "PATH")]
    pub trajectory: Option<PathBuf>,
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Crystal pattern: rocksalt, perovskite or fluorite.
    #[arg(short, long, default_value = "rocksalt", value_name = "NAME")]
    pub pattern: String,

    /// Cation composition as comma-separated `Species=fraction` pairs (e.g., 'Mg=0.5,Zn=0.5').
    #[arg(short = 'c', long, required = true, value_name = "SPEC")]
    pub composition: String,

    /// Lattice constant of the conventional cubic cell in Angstrom.
    #[arg(short = 'a', long, default_value_t = 5.0, value_name = "FLOAT")]
    pub lattice_constant: f64,

    /// Supercell repetitions along each axis (e.g., '2x2x2').
    #[arg(short, long, default_value = "1x1x1", value_name = "NxNxN")]
    pub supercell: String,

    /// Dopant added on the cation sublattice as `Species=fraction` (e.g., 'Li=0.25').
    #[arg(short, long, value_name = "SPEC")]
    pub dopant: Option<String>,

    /// Random seed for the cation ordering.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Path for the output extended XYZ file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}
