use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Report output format.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// CLI arguments for the ilc binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ilc",
    version,
    about = "Inline class lowering: representations, boxing, mangled symbols and ABI units"
)]
pub struct CliArgs {
    /// Print the resolved configuration instead of lowering.
    #[arg(long = "showConfig", alias = "show-config")]
    pub show_config: bool,

    /// Path to ilc.json or a directory containing it.
    #[arg(short = 'p', long = "project")]
    pub project: Option<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, ignore_case = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long)]
    pub pretty: bool,

    /// Characters of the signature hash kept in mangled names (4-16).
    #[arg(long = "hashLength", alias = "hash-length")]
    pub hash_length: Option<usize>,

    /// Maximum depth of a wrapper-over-wrapper carrier chain.
    #[arg(long = "maxCarrierDepth", alias = "max-carrier-depth")]
    pub max_carrier_depth: Option<u32>,

    /// Resolve and synthesize wrappers on a single thread.
    #[arg(long = "noParallel", alias = "no-parallel")]
    pub no_parallel: bool,

    /// Disable colored output.
    #[arg(long = "noColor", alias = "no-color")]
    pub no_color: bool,

    /// Unit manifests to lower.
    #[arg(value_name = "UNITS")]
    pub units: Vec<PathBuf>,
}
