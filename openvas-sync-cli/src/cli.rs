//! Command-line arguments
//!
//! Policy flags mirror the `[ingest]` config keys and win over them.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// openvas-sync -- pull scan reports from gvmd into a relational database.
///
/// Use `openvas-sync <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "openvas-sync", version, about, long_about = None)]
pub struct Cli {
    /// Path to the openvas-sync.toml configuration file.
    #[arg(short, long, global = true, default_value = "openvas-sync.toml")]
    pub config: PathBuf,

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
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every report from gvmd and store it.
    Fetch(FetchArgs),

    /// Test connectivity to gvmd and the database.
    Check(CheckArgs),

    /// Inspect stored reports.
    Reports(ReportsArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- fetch ----

/// What to do with a report that is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DuplicateArg {
    /// Count it as skipped.
    Skip,
    /// Count it as failed.
    Fail,
}

impl DuplicateArg {
    pub fn as_config_value(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Fail => "fail",
        }
    }
}

/// What to do when a CSV row cannot be parsed or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RowErrorArg {
    /// Record the row and continue with the next one.
    SkipRow,
    /// Fail the whole report and remove what was stored for it.
    AbortReport,
}

impl RowErrorArg {
    pub fn as_config_value(self) -> &'static str {
        match self {
            Self::SkipRow => "skip-row",
            Self::AbortReport => "abort-report",
        }
    }
}

/// Run one ingestion pass.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Keep results in memory instead of writing to the database. CSV artifacts
    /// go to a temporary directory unless `--data-dir` is given.
    #[arg(long)]
    pub dry_run: bool,

    /// Duplicate report policy (overrides `ingest.on_duplicate_report`).
    #[arg(long)]
    pub on_duplicate: Option<DuplicateArg>,

    /// Row failure policy (overrides `ingest.on_row_error`).
    #[arg(long)]
    pub on_row_error: Option<RowErrorArg>,

    /// Directory for decoded CSV artifacts (overrides `general.data_dir`).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

// ---- check ----

/// Test connectivity. Without flags both targets are checked.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Authenticate against gvmd.
    #[arg(long)]
    pub gmp: bool,

    /// Connect to the database.
    #[arg(long)]
    pub database: bool,
}

// ---- reports ----

/// Inspect stored reports.
#[derive(Args, Debug)]
pub struct ReportsArgs {
    #[command(subcommand)]
    pub action: ReportsAction,
}

#[derive(Subcommand, Debug)]
pub enum ReportsAction {
    /// List stored reports.
    List,
    /// Show one report with its findings.
    Show {
        /// Report identifier.
        report_id: String,
    },
}

// ---- config ----

/// Manage configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration with passwords masked.
    Show {
        /// Only show one section (general, gmp, database, ingest).
        #[arg(long)]
        section: Option<String>,
    },
    /// Validate the configuration file.
    Validate,
}
