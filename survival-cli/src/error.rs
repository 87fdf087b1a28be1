//! CLI-specific error types and exit code mapping

use survival_core::error::SurvivalError;
use survival_engine::EngineError;
use survival_report::ReportError;
use survival_sandbox::SandboxError;

/// CLI-specific error type.
///
/// Run verdicts (failed scenarios, expectation mismatches) are errors too,
/// so that every non-zero exit flows through [`CliError::exit_code`].
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Config file, matrix schema, unknown tool or sandbox.
    #[error("configuration error: {0}")]
    Config(String),

    /// Sandbox failed to spawn, become healthy, or stop.
    #[error("infrastructure error: {0}")]
    Infra(String),

    /// At least one scenario lost remote provenance.
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },

    /// Strict mode: results contradict the matrix's expectations.
    #[error("{count} result(s) contradict their expected outcome")]
    ExpectationMismatch { count: usize },

    /// Writing or reading a report failed.
    #[error("report error: {0}")]
    Report(String),

    /// Operator interrupt. Teardown has already run.
    #[error("run cancelled")]
    Cancelled,

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Every scenario survived                   |
    /// | 1    | Scenarios failed                          |
    /// | 2    | Configuration error                       |
    /// | 3    | Infrastructure error                      |
    /// | 4    | Strict mode expectation mismatch          |
    /// | 10   | Report / IO error                         |
    /// | 130  | Cancelled by operator interrupt           |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ScenariosFailed { .. } => 1,
            Self::Config(_) => 2,
            Self::Infra(_) => 3,
            Self::ExpectationMismatch { .. } => 4,
            Self::Report(_) | Self::JsonSerialize(_) | Self::Io(_) => 10,
            Self::Cancelled => 130,
        }
    }
}

impl From<SurvivalError> for CliError {
    fn from(e: SurvivalError) -> Self {
        match e {
            SurvivalError::Config(_) | SurvivalError::Matrix(_) => Self::Config(e.to_string()),
            SurvivalError::Infra(_) => Self::Infra(e.to_string()),
            SurvivalError::Emit(_) => Self::Report(e.to_string()),
            SurvivalError::Io(io) => Self::Io(io),
            SurvivalError::Scenario(survival_core::ScenarioError::Cancelled) => Self::Cancelled,
            SurvivalError::Scenario(_) => Self::Infra(e.to_string()),
        }
    }
}

impl From<SandboxError> for CliError {
    fn from(e: SandboxError) -> Self {
        Self::Infra(e.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Cancelled => Self::Cancelled,
            other => SurvivalError::from(other).into(),
        }
    }
}

impl From<ReportError> for CliError {
    fn from(e: ReportError) -> Self {
        Self::Report(e.to_string())
    }
}
