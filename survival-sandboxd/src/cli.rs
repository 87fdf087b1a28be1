//! CLI argument definitions for survival-sandboxd.

use clap::Parser;
use survival_core::types::SandboxKind;

/// Reference origin sandbox.
///
/// Serves one delivery-policy variant on `127.0.0.1:<port>` until
/// SIGTERM or SIGINT is received.
#[derive(Parser, Debug)]
#[command(name = "survival-sandboxd")]
#[command(version, about, long_about = None)]
pub struct SandboxdCli {
    /// Sandbox variant (strip-happy, preserve-embed, remote-only).
    #[arg(long)]
    pub variant: SandboxKind,

    /// Port to bind on 127.0.0.1. `0` picks a free port.
    #[arg(long)]
    pub port: u16,

    /// External image tool used for transforms that cannot run natively.
    #[arg(long, default_value = "magick")]
    pub magick_bin: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (json, pretty).
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}
