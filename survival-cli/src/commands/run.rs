//! `survival run` command handler
//!
//! Matrix → sandboxes → scenarios → report. Sandbox teardown runs on every
//! exit path after the manager is created, including operator interrupt.

use std::path::Path;
use std::sync::Arc;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use survival_core::config::{ReportConfig, SurvivalConfig};
use survival_core::error::SurvivalError;
use survival_core::matrix::HostilePathMatrix;
use survival_core::metrics as m;
use survival_core::policy::EdgePolicy;
use survival_engine::{ProbeClient, ScenarioRunner, run_matrix};
use survival_report::{RunOutcome, SurvivalReport, json, junit};
use survival_sandbox::{SandboxEndpoints, SandboxManager};

use crate::cli::RunArgs;
use crate::commands::load_matrix;
use crate::commands::report::ReportSummary;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `run` command.
pub async fn execute(
    args: RunArgs,
    mut config: SurvivalConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    apply_overrides(&args, &mut config)?;

    let policy = EdgePolicy::from_env();
    policy.validate().map_err(SurvivalError::from)?;
    info!(
        remote_only = policy.remote_only,
        preserve_paths = ?policy.preserve_paths,
        drop_if_link_missing = policy.drop_if_link_missing,
        break_glass_hosts = ?policy.break_glass_hosts,
        "effective edge policy"
    );

    let matrix = load_matrix(&args.matrix, &config.sandbox.magick_binary).await?;
    let metrics = install_metrics_recorder(&config.report)?;

    let mut manager = SandboxManager::from_config(&config.sandbox)?;
    let cancel = CancellationToken::new();
    let signal_watcher = spawn_signal_watcher(cancel.clone());

    let run = async {
        manager.start_all().await?;
        run_with_endpoints(&matrix, &config, manager.endpoints(), cancel.clone()).await
    };
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CliError::Cancelled),
        result = run => result,
    };

    signal_watcher.abort();
    let teardown = manager.stop_all().await;
    if let Err(e) = &teardown {
        error!(error = %e, "sandbox teardown failed");
    }

    let report = result?;
    teardown?;

    emit(&report, &matrix, &config, metrics.as_ref(), writer).await
}

/// Runs every scenario against the given sandbox endpoints and aggregates the results.
pub async fn run_with_endpoints(
    matrix: &HostilePathMatrix,
    config: &SurvivalConfig,
    endpoints: SandboxEndpoints,
    cancel: CancellationToken,
) -> Result<SurvivalReport, CliError> {
    let client = ProbeClient::new(&config.probe)?;
    let runner = Arc::new(ScenarioRunner::new(client, endpoints));

    let results = run_matrix(runner, matrix, config.runner.concurrency, cancel).await?;

    // 모든 태스크가 끝난 뒤에만 집계
    let report = SurvivalReport::new(matrix.version, results);
    report.record_gauges();
    info!(
        run_id = report.run_id(),
        scenarios = report.total_scenarios(),
        failed = report.scenarios_failed(),
        remote_survival_rate = report.remote_survival_rate(),
        "matrix run complete"
    );
    Ok(report)
}

/// Writes the reports, prints the summary, and turns the verdict into a result.
pub async fn emit(
    report: &SurvivalReport,
    matrix: &HostilePathMatrix,
    config: &SurvivalConfig,
    metrics: Option<&PrometheusHandle>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let json_path = config.report.json_path();
    let junit_path = config.report.junit_path();
    json::write(report, &json_path).await?;
    junit::write(report, &junit_path).await?;

    let mut written: Vec<&Path> = vec![json_path.as_path(), junit_path.as_path()];
    let metrics_path = config.report.metrics_path();
    if let (Some(handle), Some(path)) = (metrics, metrics_path.as_deref()) {
        tokio::fs::write(path, handle.render())
            .await
            .map_err(|e| CliError::Report(format!("{}: {}", path.display(), e)))?;
        written.push(path);
    }

    let outcome = RunOutcome::evaluate(report, matrix, config.runner.strict);
    let summary = ReportSummary::new(report)
        .with_outcome(outcome.clone())
        .with_written(&written);
    writer.render(&summary)?;

    match outcome {
        RunOutcome::Passed => Ok(()),
        RunOutcome::ScenariosFailed { failed } => Err(CliError::ScenariosFailed {
            failed,
            total: report.total_scenarios(),
        }),
        RunOutcome::ExpectationMismatch { mismatches } => {
            for mismatch in &mismatches {
                warn!(%mismatch, "result contradicts expectation");
            }
            Err(CliError::ExpectationMismatch {
                count: mismatches.len(),
            })
        }
    }
}

fn apply_overrides(args: &RunArgs, config: &mut SurvivalConfig) -> Result<(), CliError> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            return Err(CliError::Config("--concurrency must be greater than 0".to_owned()));
        }
        config.runner.concurrency = concurrency;
    }
    if args.strict {
        config.runner.strict = true;
    }
    if let Some(dir) = &args.output_dir {
        config.report.output_dir = dir.display().to_string();
    }
    Ok(())
}

/// Installs the Prometheus recorder when a metrics textfile is configured.
///
/// The recorder is process-global, so this runs at most once per process.
fn install_metrics_recorder(report: &ReportConfig) -> Result<Option<PrometheusHandle>, CliError> {
    if report.metrics_path().is_none() {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(m::PROBE_DURATION_SECONDS.to_owned()),
            &m::PROBE_DURATION_BUCKETS,
        )
        .map_err(|e| CliError::Config(format!("invalid metrics buckets: {}", e)))?
        .install_recorder()
        .map_err(|e| CliError::Config(format!("failed to install metrics recorder: {}", e)))?;

    m::describe_all();
    Ok(Some(handle))
}

fn spawn_signal_watcher(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => {
                warn!(signal, "interrupt received, cancelling run");
                cancel.cancel();
            }
            Err(e) => error!(error = %e, "signal handlers unavailable"),
        }
    })
}

/// Wait for SIGTERM or SIGINT.
async fn wait_for_shutdown_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
