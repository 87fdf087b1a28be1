//! Survival sandbox daemon library.
//!
//! Exposes the serve loop for integration testing.
//! In production, `survival-sandboxd` is used as a binary (main.rs).

pub mod cli;
pub mod logging;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use survival_sandbox::registry::SANDBOX_HOST;
use survival_sandbox::server::{self, SandboxState};
use survival_transform::MagickPipeline;

use crate::cli::SandboxdCli;

/// Bind, serve, and return once a shutdown signal has drained the server.
pub async fn run(cli: SandboxdCli) -> Result<()> {
    // 바인딩 전에 핸들러를 설치해야 관리자의 SIGTERM을 놓치지 않음
    let shutdown = shutdown_signal()?;
    run_until(cli, shutdown).await
}

/// Like [`run`], with a caller-supplied shutdown future.
pub async fn run_until(
    cli: SandboxdCli,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = format!("{SANDBOX_HOST}:{}", cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", addr, e))?;
    let local = listener
        .local_addr()
        .map_err(|e| anyhow::anyhow!("failed to read local address: {}", e))?;

    let state = Arc::new(SandboxState::new(
        cli.variant,
        local.port(),
        MagickPipeline::new(cli.magick_bin),
    ));

    tracing::info!(
        sandbox = %cli.variant,
        addr = %local,
        policy = cli.variant.declared_policy(),
        "sandbox listening"
    );

    server::serve(listener, state, shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(sandbox = %cli.variant, "sandbox shut down");
    Ok(())
}

/// Installs SIGTERM/SIGINT handlers and returns a future that completes on
/// the first signal.
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        let signal = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal, "shutdown signal received");
    })
}
