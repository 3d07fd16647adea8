//! Output formatting for the `detect` and `resolve` commands
//!
//! JSON and YAML serialize the same structures the library returns; the
//! human format is a short aligned summary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::config::Platform;
use crate::detect::{Signature, SignatureReport};
use crate::resolve::{BuilderSelection, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

/// Result of running every detector against one directory
#[derive(Debug, Clone, Serialize)]
pub struct DetectReport {
    pub directory: PathBuf,
    pub platform: Platform,
    /// What resolution would pick from the signatures alone
    pub selected: Option<Signature>,
    pub signatures: Vec<SignatureReport>,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: String,
    paths: Vec<&'a PathBuf>,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_detect(&self, report: &DetectReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).context("Failed to serialize detection report to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(report).context("Failed to serialize detection report to YAML"),
            OutputFormat::Human => Ok(self.format_detect_human(report)),
        }
    }

    pub fn format_selection(&self, selection: &BuilderSelection) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(selection).context("Failed to serialize builder selection to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(selection).context("Failed to serialize builder selection to YAML"),
            OutputFormat::Human => Ok(self.format_selection_human(selection)),
        }
    }

    /// Resolution failures keep their paths so the user can act on them
    pub fn format_resolve_error(&self, error: &ResolveError) -> Result<String> {
        let output = ErrorOutput {
            error: error.to_string(),
            paths: error.paths(),
        };
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&output).context("Failed to serialize error to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(&output).context("Failed to serialize error to YAML"),
            OutputFormat::Human => {
                let mut out = format!("Error: {}\n", output.error);
                for path in output.paths {
                    let _ = writeln!(out, "  - {}", path.display());
                }
                Ok(out)
            }
        }
    }

    fn format_detect_human(&self, report: &DetectReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Directory: {}", report.directory.display());
        let _ = writeln!(out, "Platform:  {}", report.platform);
        let _ = writeln!(
            out,
            "Selected:  {}",
            report.selected.map(|s| s.name()).unwrap_or("none (basic site)")
        );
        out.push('\n');

        for row in &report.signatures {
            let status = if !row.applicable {
                "n/a"
            } else if row.matched {
                "yes"
            } else {
                "no"
            };
            let _ = writeln!(out, "  {:<14} {}", row.signature.name(), status);
        }
        out
    }

    fn format_selection_human(&self, selection: &BuilderSelection) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Builder:  {} ({})",
            selection.kind().name(),
            selection.kind().as_str()
        );
        let _ = writeln!(out, "Project:  {}", selection.project_path().display());
        if let Some(solution) = selection.solution_path() {
            let _ = writeln!(out, "Solution: {}", solution.display());
        }
        if let Some(command) = selection.command() {
            let _ = writeln!(out, "Command:  {}", command);
        }
        out
    }
}
