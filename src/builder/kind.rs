//! Builder variant table
//!
//! Every generator-family builder differs only in the flags it hands the
//! script generator. Those live here as data.

use crate::resolve::{BuilderKind, BuilderSelection};
use std::path::Path;

/// How a builder produces its deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderFamily {
    /// Generate a deployment script with the external generator, then run it
    Generator,
    /// Run a command or copy files without a generated script
    Direct,
}

/// What a generator-family builder passes about its project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagShape {
    /// `<flag> "<project>" [--solutionFile "<sln>"]`
    Project(&'static str),
    /// `<flag> --sitePath "<path>" [--solutionFile "<sln>"]`
    SitePath(&'static str),
    /// User-provided arguments verbatim
    Verbatim,
}

fn flag_shape(kind: BuilderKind) -> Option<FlagShape> {
    use FlagShape::*;
    let shape = match kind {
        BuilderKind::Wap => Project("--aspWAP"),
        BuilderKind::WebSite => SitePath("--aspWebSite"),
        BuilderKind::AspNetCore => Project("--aspNetCore"),
        BuilderKind::FunctionMsbuild => Project("--functionApp"),
        BuilderKind::DotNetConsole => Project("--dotNetConsole"),
        BuilderKind::Node => SitePath("--node"),
        BuilderKind::Python => SitePath("--python"),
        BuilderKind::Go => SitePath("--go"),
        BuilderKind::Ruby => SitePath("--ruby"),
        BuilderKind::Php => SitePath("--php"),
        BuilderKind::FunctionBasic => SitePath("--functionApp"),
        BuilderKind::Basic => SitePath("--basic"),
        BuilderKind::CustomGenerator => Verbatim,
        BuilderKind::CustomCommand | BuilderKind::RunFromPackage | BuilderKind::OneDeploy => {
            return None
        }
    };
    Some(shape)
}

pub fn family(kind: BuilderKind) -> BuilderFamily {
    match flag_shape(kind) {
        Some(_) => BuilderFamily::Generator,
        None => BuilderFamily::Direct,
    }
}

/// Kinds that copy console worker templates before generating
pub fn needs_worker_template(kind: BuilderKind) -> bool {
    kind == BuilderKind::DotNetConsole
}

/// Quotes a path for the generator, trimming trailing separators
///
/// A trailing backslash before the closing quote would escape it.
pub fn quote_path(path: &Path) -> String {
    let text = path.display().to_string();
    let trimmed = text.trim_end_matches(['/', '\\']);
    // Keep the root itself.
    let trimmed = if trimmed.is_empty() { text.as_str() } else { trimmed };
    format!("\"{}\"", trimmed)
}

/// Generator flags for a selection, `None` for direct-family builders
pub fn generator_flags(selection: &BuilderSelection) -> Option<String> {
    let shape = flag_shape(selection.kind())?;

    let mut flags = match shape {
        FlagShape::Project(flag) => format!("{} {}", flag, quote_path(selection.project_path())),
        FlagShape::SitePath(flag) => {
            format!("{} --sitePath {}", flag, quote_path(selection.project_path()))
        }
        FlagShape::Verbatim => return Some(selection.command().unwrap_or_default().to_string()),
    };

    if let Some(solution) = selection.solution_path() {
        flags.push_str(&format!(" --solutionFile {}", quote_path(solution)));
    }

    Some(flags)
}

/// Full generator invocation, also the script cache key
pub fn generator_command_line(
    generator: &Path,
    repository: &Path,
    deployments: &Path,
    flags: &str,
) -> String {
    format!(
        "{} -y --no-dot-deployment -r {} -o {} {}",
        generator.display(),
        quote_path(repository),
        quote_path(deployments),
        flags
    )
    .trim_end()
    .to_string()
}
