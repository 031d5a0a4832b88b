use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "CPORT CLI - Consensus prediction of protein-protein interface residues from several remote predictors.",
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

    /// Set the number of threads used for residue distance computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the predictors on one chain and write the consensus interface annotation.
    Predict(PredictArgs),
    /// List the available predictors with their default polling and cutoffs.
    Predictors,
}

/// Arguments for the `predict` subcommand.
#[derive(Args, Debug)]
pub struct PredictArgs {
    // --- Input ---
    #[command(flatten)]
    pub source: StructureSource,

    /// Chain to predict the interface of.
    #[arg(short, long, required = true, value_name = "CHAIN")]
    pub chain: char,

    /// PDB code passed to predictors that look structures up by identifier.
    /// Implied by --pdb-id.
    #[arg(long, value_name = "CODE", conflicts_with = "pdb_id")]
    pub pdb_code: Option<String>,

    /// Name used for the output files. Defaults to the PDB code or the input file stem.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Per-residue relative accessibility CSV (residue,relative_mainchain,relative_sidechain).
    /// A prediction run fails without it.
    #[arg(long, value_name = "PATH")]
    pub surface: Option<PathBuf>,

    /// Residue distance CSV (residue_a,residue_b,distance). Computed from coordinates if omitted.
    #[arg(long, value_name = "PATH")]
    pub distances: Option<PathBuf>,

    // --- Consensus ---
    /// Path to a configuration file in TOML format.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Sensitivity from 1 (most permissive) to 9 (most stringent), overriding the config file.
    #[arg(short, long, value_name = "LEVEL")]
    pub sensitivity: Option<u8>,

    /// Comma-separated predictors to run (e.g. 'promate,psiver'). Defaults to all.
    #[arg(short, long, value_name = "NAMES", value_delimiter = ',')]
    pub predictors: Vec<String>,

    /// Reuse saved scores for a predictor instead of contacting its server.
    /// Can be used multiple times. Example: --precomputed psiver=1ppe_psiver.csv
    #[arg(long, value_name = "NAME=PATH")]
    pub precomputed: Vec<String>,

    /// Replace the built-in threshold tables with a TOML file.
    #[arg(long, value_name = "PATH")]
    pub thresholds: Option<PathBuf>,

    // --- Output ---
    /// Directory receiving the annotated structure and the result tables.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S predictors.psiver.num-retries=100
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Exactly one way of obtaining the input structure.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct StructureSource {
    /// Path to the input structure in PDB format.
    #[arg(short = 'f', long, value_name = "PATH")]
    pub pdb_file: Option<PathBuf>,
    /// Four-character PDB identifier downloaded from RCSB.
    #[arg(short = 'i', long, value_name = "ID")]
    pub pdb_id: Option<String>,
}
