//! openvas-sync command-line interface
//!
//! The binary in `main.rs` parses arguments, loads configuration, initializes
//! logging and dispatches to the handlers in [`commands`].

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

use openvas_sync_core::config::SyncConfig;

use crate::cli::{Cli, Commands, ConfigAction};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Runs the parsed command line.
///
/// `config validate` reads the file itself; every other command works on the
/// effective configuration (file, then environment, then CLI flags).
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    if let Commands::Config(args) = &cli.command {
        if matches!(args.action, ConfigAction::Validate) {
            init_logging(&SyncConfig::default(), cli.log_level.as_deref())?;
            return commands::config::execute_validate(&cli.config, &writer).await;
        }
    }

    let config = SyncConfig::load_optional(&cli.config).await?;
    init_logging(&config, cli.log_level.as_deref())?;
    openvas_sync_core::metrics::describe_all();
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match cli.command {
        Commands::Fetch(args) => commands::fetch::execute(args, config, &writer).await,
        Commands::Check(args) => commands::check::execute(args, &config, &writer).await,
        Commands::Reports(args) => commands::reports::execute(args, &config, &writer).await,
        Commands::Config(args) => match args.action {
            ConfigAction::Show { section } => {
                commands::config::execute_show(&config, &cli.config, section, &writer)
            }
            ConfigAction::Validate => commands::config::execute_validate(&cli.config, &writer).await,
        },
    }
}

fn init_logging(config: &SyncConfig, level_override: Option<&str>) -> Result<(), CliError> {
    logging::init_tracing(&config.general, level_override)
        .map_err(|e| CliError::Config(format!("{e:#}")))
}
