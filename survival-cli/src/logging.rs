//! Logging initialization for the `survival` CLI.
//!
//! Logs go to stderr so that `--output json` on stdout stays machine-readable.

use anyhow::{Context, Result, bail};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use survival_core::config::GeneralConfig;

/// Installs the global subscriber from `[general]`.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Calling this twice
/// in one process is an error.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let layer = match config.log_format.as_str() {
        "json" => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        "pretty" => fmt::layer().with_writer(std::io::stderr).boxed(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .with_context(|| format!("failed to initialize {} tracing subscriber", config.log_format))
}
