//! `survival report` command handler, plus the summary shared with `run`

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use survival_core::types::{FailureCode, SandboxKind};
use survival_report::{RunOutcome, SurvivalReport, json};

use crate::cli::ReportArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, percent};

/// Execute the `report` command.
///
/// Re-derives the statistics from the stored results and rejects drift.
/// Exits non-zero when the stored run had failing scenarios.
pub async fn execute(args: ReportArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let report = json::read(&args.input).await?;
    tracing::info!(path = %args.input.display(), run_id = report.run_id(), "report verified");

    let summary = ReportSummary::new(&report);
    writer.render(&summary)?;

    if report.passed() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: report.scenarios_failed(),
            total: report.total_scenarios(),
        })
    }
}

/// Summary payload for `run` and `report`.
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub run_id: String,
    pub timestamp: String,
    pub matrix_version: u32,
    pub total_scenarios: usize,
    pub scenarios_failed: usize,
    pub remote_survival_rate: f64,
    pub embed_survival_rate_preserve_only: f64,
    pub failure_breakdown: BTreeMap<FailureCode, usize>,
    pub failures: Vec<FailureEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub written: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FailureEntry {
    pub scenario_id: String,
    pub sandbox: SandboxKind,
    pub failure_code: FailureCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportSummary {
    pub fn new(report: &SurvivalReport) -> Self {
        let failures = report
            .results()
            .iter()
            .filter(|r| !r.remote_survives)
            .map(|r| FailureEntry {
                scenario_id: r.scenario_id.clone(),
                sandbox: r.sandbox,
                failure_code: r.failure_code,
                error: r.error.clone(),
            })
            .collect();

        Self {
            run_id: report.run_id().to_owned(),
            timestamp: report.timestamp().to_owned(),
            matrix_version: report.matrix_version(),
            total_scenarios: report.total_scenarios(),
            scenarios_failed: report.scenarios_failed(),
            remote_survival_rate: report.remote_survival_rate(),
            embed_survival_rate_preserve_only: report.embed_survival_rate_preserve_only(),
            failure_breakdown: report.failure_breakdown().clone(),
            failures,
            outcome: None,
            written: Vec::new(),
        }
    }

    pub fn with_outcome(mut self, outcome: RunOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_written(mut self, paths: &[&Path]) -> Self {
        self.written = paths.iter().map(|p| p.display().to_string()).collect();
        self
    }
}

impl Render for ReportSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Run {} (matrix v{}, {})",
            self.run_id.bold(),
            self.matrix_version,
            self.timestamp
        )?;
        writeln!(
            w,
            "Scenarios: {}  Failed: {}",
            self.total_scenarios, self.scenarios_failed
        )?;

        let remote = percent(self.remote_survival_rate);
        if self.scenarios_failed == 0 {
            writeln!(w, "Remote survival: {}", remote.green().bold())?;
        } else {
            writeln!(w, "Remote survival: {}", remote.red().bold())?;
        }
        writeln!(
            w,
            "Embed survival (preserve-embed): {}",
            percent(self.embed_survival_rate_preserve_only)
        )?;

        writeln!(w)?;
        writeln!(w, "{:<24} Count", "Code")?;
        writeln!(w, "{}", "-".repeat(32))?;
        for (code, count) in &self.failure_breakdown {
            let line = format!("{:<24} {}", code.as_str(), count);
            if *count == 0 {
                writeln!(w, "{}", line.dimmed())?;
            } else if code.is_survival() {
                writeln!(w, "{}", line.green())?;
            } else {
                writeln!(w, "{}", line.red())?;
            }
        }

        if !self.failures.is_empty() {
            writeln!(w)?;
            writeln!(w, "Failures:")?;
            for f in &self.failures {
                write!(
                    w,
                    "  {} {} [{}] {}",
                    "✗".red(),
                    f.scenario_id,
                    f.sandbox,
                    f.failure_code.as_str().yellow()
                )?;
                match &f.error {
                    Some(error) => writeln!(w, ": {error}")?,
                    None => writeln!(w)?,
                }
            }
        }

        if let Some(outcome) = &self.outcome {
            writeln!(w)?;
            match outcome {
                RunOutcome::Passed => writeln!(w, "Verdict: {}", "PASSED".green().bold())?,
                RunOutcome::ScenariosFailed { failed } => {
                    writeln!(w, "Verdict: {} ({failed} failed)", "FAILED".red().bold())?;
                }
                RunOutcome::ExpectationMismatch { mismatches } => {
                    writeln!(w, "Verdict: {}", "EXPECTATION MISMATCH".red().bold())?;
                    for m in mismatches {
                        writeln!(w, "  {m}")?;
                    }
                }
            }
        }

        if !self.written.is_empty() {
            writeln!(w)?;
            for path in &self.written {
                writeln!(w, "Wrote {path}")?;
            }
        }

        Ok(())
    }
}
