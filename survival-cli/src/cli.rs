//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Survival -- verifies that a C2 policy survives hostile delivery paths.
///
/// Use `survival <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "survival", version, about, long_about = None)]
pub struct Cli {
    /// Path to the survival.toml configuration file.
    ///
    /// When omitted, `survival.toml` in the working directory is used if it
    /// exists, otherwise built-in defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the matrix against freshly started sandboxes.
    Run(RunArgs),

    /// Load and validate a matrix without running it.
    Validate(ValidateArgs),

    /// Print the static sandbox registry.
    Sandboxes,

    /// Summarise an existing JSON report.
    Report(ReportArgs),
}

// ---- run ----

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario matrix (YAML).
    #[arg(short, long)]
    pub matrix: PathBuf,

    /// Fail when a result contradicts its scenario's `expected` block.
    #[arg(long)]
    pub strict: bool,

    /// Maximum scenarios in flight (overrides `runner.concurrency`).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Report directory (overrides `report.output_dir`).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

// ---- validate ----

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Scenario matrix (YAML).
    #[arg(short, long)]
    pub matrix: PathBuf,
}

// ---- report ----

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// JSON report written by `survival run`.
    #[arg(short, long)]
    pub input: PathBuf,
}
