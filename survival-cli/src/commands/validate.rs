//! `survival validate` command handler

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use survival_core::config::SurvivalConfig;
use survival_core::matrix::{HostilePathMatrix, ToolKind};
use survival_core::types::SandboxKind;

use crate::cli::ValidateArgs;
use crate::commands::load_matrix;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `validate` command.
pub async fn execute(
    args: ValidateArgs,
    config: &SurvivalConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let matrix = load_matrix(&args.matrix, &config.sandbox.magick_binary).await?;
    let summary = MatrixSummary::new(args.matrix.display().to_string(), &matrix);
    writer.render(&summary)?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct MatrixSummary {
    pub path: String,
    pub version: u32,
    pub scenarios: usize,
    pub by_sandbox: BTreeMap<SandboxKind, usize>,
    pub by_tool: BTreeMap<ToolKind, usize>,
}

impl MatrixSummary {
    pub fn new(path: String, matrix: &HostilePathMatrix) -> Self {
        let mut by_sandbox = BTreeMap::new();
        let mut by_tool = BTreeMap::new();
        for scenario in &matrix.scenarios {
            *by_sandbox.entry(scenario.sandbox).or_insert(0) += 1;
            for transform in &scenario.transforms {
                *by_tool.entry(transform.tool).or_insert(0) += 1;
            }
        }

        Self {
            path,
            version: matrix.version,
            scenarios: matrix.scenarios.len(),
            by_sandbox,
            by_tool,
        }
    }
}

impl Render for MatrixSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} {} (v{}, {} scenarios)",
            "Matrix valid:".green().bold(),
            self.path,
            self.version,
            self.scenarios
        )?;
        for (sandbox, count) in &self.by_sandbox {
            writeln!(w, "  {:<16} {}", sandbox.as_str(), count)?;
        }
        if !self.by_tool.is_empty() {
            let tools: Vec<String> = self
                .by_tool
                .iter()
                .map(|(tool, count)| format!("{tool}={count}"))
                .collect();
            writeln!(w, "Transforms: {}", tools.join(", "))?;
        }
        Ok(())
    }
}
