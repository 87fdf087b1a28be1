//! `survival sandboxes` command handler

use std::io::Write;

use serde::Serialize;

use survival_core::types::SandboxKind;
use survival_sandbox::SandboxRegistry;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `sandboxes` command.
pub fn execute(writer: &OutputWriter) -> Result<(), CliError> {
    writer.render(&SandboxList::new(&SandboxRegistry::builtin()))
}

#[derive(Debug, Serialize)]
pub struct SandboxList {
    pub sandboxes: Vec<SandboxEntry>,
}

#[derive(Debug, Serialize)]
pub struct SandboxEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SandboxKind,
    pub port: u16,
    pub base_url: String,
    pub policy: &'static str,
}

impl SandboxList {
    pub fn new(registry: &SandboxRegistry) -> Self {
        let sandboxes = registry
            .iter()
            .map(|config| SandboxEntry {
                name: config.name.clone(),
                kind: config.kind,
                port: config.port,
                base_url: config.base_url(),
                policy: config.kind.declared_policy(),
            })
            .collect();
        Self { sandboxes }
    }
}

impl Render for SandboxList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{:<16} {:<6} {:<18} {:<24}",
            "Name".bold(),
            "Port",
            "Policy",
            "URL"
        )?;
        writeln!(w, "{}", "-".repeat(66))?;
        for s in &self.sandboxes {
            writeln!(w, "{:<16} {:<6} {:<18} {:<24}", s.name, s.port, s.policy, s.base_url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_listing() {
        let list = SandboxList::new(&SandboxRegistry::builtin());
        assert_eq!(list.sandboxes.len(), 3);

        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value["sandboxes"][0]["name"], "strip-happy");
        assert_eq!(value["sandboxes"][0]["type"], "strip-happy");
        assert_eq!(value["sandboxes"][1]["policy"], "preserve-allowed");
        assert_eq!(value["sandboxes"][2]["base_url"], "http://127.0.0.1:4103");
    }
}
