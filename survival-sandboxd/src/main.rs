use anyhow::Result;
use clap::Parser;

use survival_core::config::GeneralConfig;
use survival_sandboxd::cli::SandboxdCli;
use survival_sandboxd::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SandboxdCli::parse();

    logging::init_tracing(&GeneralConfig {
        log_level: cli.log_level.clone(),
        log_format: cli.log_format.clone(),
    })?;

    survival_sandboxd::run(cli).await
}
