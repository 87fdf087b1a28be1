//! Survival CLI library.
//!
//! Exposes command handlers for integration testing.
//! In production, `survival` is used as a binary (main.rs).

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Load configuration, initialise logging, and dispatch the subcommand.
pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = commands::load_config(cli.config.as_deref(), cli.log_level.as_deref()).await?;
    logging::init_tracing(&config.general).map_err(|e| CliError::Config(e.to_string()))?;

    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, &writer).await,
        Commands::Validate(args) => commands::validate::execute(args, &config, &writer).await,
        Commands::Sandboxes => commands::sandboxes::execute(&writer),
        Commands::Report(args) => commands::report::execute(args, &writer).await,
    }
}
