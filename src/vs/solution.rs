//! Visual Studio solution (`.sln`) parsing
//!
//! Only project declarations matter for deployment:
//!
//! ```text
//! Project("{TYPE-GUID}") = "Name", "Relative\Path.csproj", "{PROJECT-GUID}"
//!     ProjectSection(WebsiteProperties) = preProject
//!         Release.AspNetCompiler.PhysicalPath = "..\WebSite1\"
//!     EndProjectSection
//! EndProject
//! ```
//!
//! Everything else (global sections, configurations, nesting) is skipped,
//! as are malformed lines.

use super::guids::{self, WEB_SITE_PROJECT};
use crate::fs::FileSystem;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

fn project_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*Project\("(?P<type>[^"]*)"\)\s*=\s*"(?P<name>[^"]*)"\s*,\s*"(?P<path>[^"]*)"\s*,\s*"(?P<guid>[^"]*)""#,
        )
        .expect("project line regex is valid")
    })
}

fn physical_path_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*(?P<config>Debug|Release)\.AspNetCompiler\.PhysicalPath\s*=\s*"(?P<path>[^"]*)""#,
        )
        .expect("physical path regex is valid")
    })
}

/// One `Project(...)` entry of a solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolutionProject {
    pub name: String,
    /// Path exactly as written in the solution
    pub relative_path: String,
    /// Solution-level type GUID; unknown types are kept as-is
    pub type_guid: Option<Uuid>,
    pub project_guid: Option<Uuid>,
    pub debug_physical_path: Option<String>,
    pub release_physical_path: Option<String>,
    /// Resolved location: the project file, or the site directory for websites
    pub absolute_path: PathBuf,
}

impl SolutionProject {
    /// Website projects have no project file, only a solution entry
    pub fn is_web_site(&self) -> bool {
        self.type_guid == Some(WEB_SITE_PROJECT)
    }

    pub fn is_solution_folder(&self) -> bool {
        self.type_guid == Some(guids::SOLUTION_FOLDER)
    }

    fn resolve_path(&mut self, solution_dir: &Path) {
        // IIS Express websites carry a URL as their path; the compiler
        // physical path (Release first) says where the files are.
        let raw = if self.is_web_site() && self.relative_path.contains("://") {
            self.release_physical_path
                .as_deref()
                .or(self.debug_physical_path.as_deref())
                .unwrap_or(&self.relative_path)
        } else {
            &self.relative_path
        };
        self.absolute_path = solution_dir.join(normalize_separators(raw));
    }
}

/// A parsed solution file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolutionDescriptor {
    pub path: PathBuf,
    /// Projects in declaration order
    pub projects: Vec<SolutionProject>,
}

impl SolutionDescriptor {
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }

    /// Whether any entry resolves to `project_path`
    pub fn references(&self, project_path: &Path) -> bool {
        self.projects
            .iter()
            .any(|p| same_path(&p.absolute_path, project_path))
    }
}

/// Reads and parses a solution file
pub fn parse_solution(fs: &dyn FileSystem, path: &Path) -> Result<SolutionDescriptor> {
    let content = fs
        .read_to_string(path)
        .with_context(|| format!("Failed to read solution {}", path.display()))?;
    Ok(parse_solution_content(path, &content))
}

/// Parses solution text; never fails
pub fn parse_solution_content(path: &Path, content: &str) -> SolutionDescriptor {
    let solution_dir = path.parent().unwrap_or(Path::new(""));
    let mut projects = Vec::new();
    let mut current: Option<SolutionProject> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(caps) = project_line().captures(line) {
            if let Some(done) = current.take() {
                projects.push(done);
            }
            current = Some(SolutionProject {
                name: caps["name"].to_string(),
                relative_path: caps["path"].to_string(),
                type_guid: guids::parse_guid(&caps["type"]),
                project_guid: guids::parse_guid(&caps["guid"]),
                debug_physical_path: None,
                release_physical_path: None,
                absolute_path: PathBuf::new(),
            });
            continue;
        }

        if trimmed.eq_ignore_ascii_case("EndProject") {
            if let Some(done) = current.take() {
                projects.push(done);
            }
            continue;
        }

        if let (Some(project), Some(caps)) = (current.as_mut(), physical_path_line().captures(line)) {
            let value = Some(caps["path"].to_string());
            match &caps["config"] {
                "Release" => project.release_physical_path = value,
                _ => project.debug_physical_path = value,
            }
        }
    }

    if let Some(done) = current.take() {
        projects.push(done);
    }

    for project in &mut projects {
        project.resolve_path(solution_dir);
    }

    SolutionDescriptor {
        path: path.to_path_buf(),
        projects,
    }
}

/// Solutions are often authored on Windows
fn normalize_separators(raw: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(raw)
    } else {
        PathBuf::from(raw.replace('\\', "/"))
    }
}

/// Compares paths component-wise, ignoring `.` and trailing separators
pub(crate) fn same_path(a: &Path, b: &Path) -> bool {
    let strip = |p: &Path| -> Vec<std::ffi::OsString> {
        p.components()
            .filter(|c| !matches!(c, std::path::Component::CurDir))
            .map(|c| c.as_os_str().to_os_string())
            .collect()
    };
    strip(a) == strip(b)
}
