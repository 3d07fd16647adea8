//! MSBuild project file inspection
//!
//! Reads the handful of facts deployment cares about from a `.csproj`,
//! `.vbproj` or `.fsproj`: target framework, SDK, output type, project type
//! GUIDs and framework references. Element names are matched by local name
//! so both namespaced legacy projects and SDK-style projects work.

use super::guids::{self, WEB_APPLICATION_PROJECT};
use crate::fs::{has_extension, FileSystem};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Extensions of MSBuild project files a builder can deploy
pub const PROJECT_EXTENSIONS: &[&str] = &["csproj", "vbproj", "fsproj"];

/// Framework references that make a project ASP.NET Core style
const ASPNETCORE_FRAMEWORK_REFERENCES: &[&str] = &["Microsoft.AspNetCore.App", "Microsoft.NETCore.App"];

const WEB_SDK_PREFIX: &str = "Microsoft.NET.Sdk.Web";

pub fn is_project_file(path: &Path) -> bool {
    PROJECT_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

/// What a project is, as far as builder selection is concerned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
    /// Project file, or the site directory of a website project
    pub path: PathBuf,
    pub is_web_site: bool,
    pub project_type_guids: Vec<Uuid>,
    pub sdk: Option<String>,
    pub target_framework: Option<String>,
    pub output_type: Option<String>,
    pub framework_references: Vec<String>,
    pub has_project_json: bool,
    pub is_function_app: bool,
}

impl ProjectDescriptor {
    /// A website project: a directory with no project file
    pub fn web_site(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_web_site: true,
            ..Default::default()
        }
    }

    pub fn is_wap(&self) -> bool {
        self.project_type_guids.contains(&WEB_APPLICATION_PROJECT)
    }

    pub fn is_aspnet_core(&self) -> bool {
        if self.is_web_site {
            return false;
        }
        let web_sdk = self
            .sdk
            .as_deref()
            .is_some_and(|sdk| sdk.starts_with(WEB_SDK_PREFIX));
        let framework_reference = self
            .framework_references
            .iter()
            .any(|r| ASPNETCORE_FRAMEWORK_REFERENCES.contains(&r.as_str()));
        web_sdk || framework_reference || self.has_project_json
    }

    pub fn is_executable(&self) -> bool {
        !self.is_aspnet_core()
            && self
                .output_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("exe"))
    }

    /// WAP, website, ASP.NET Core or Function App
    pub fn is_deployable(&self) -> bool {
        self.is_wap() || self.is_web_site || self.is_aspnet_core() || self.is_function_app
    }

    pub fn directory(&self) -> &Path {
        if self.is_web_site {
            &self.path
        } else {
            self.path.parent().unwrap_or(Path::new(""))
        }
    }
}

/// Reads and inspects a project file
///
/// `function_app` is the hosting signal; project files do not carry it.
pub fn parse_project(fs: &dyn FileSystem, path: &Path, function_app: bool) -> Result<ProjectDescriptor> {
    let content = fs
        .read_to_string(path)
        .with_context(|| format!("Failed to read project {}", path.display()))?;

    let mut descriptor = parse_project_content(path, &content);
    descriptor.has_project_json = path
        .parent()
        .is_some_and(|dir| fs.is_file(&dir.join("project.json")));
    descriptor.is_function_app = function_app;
    Ok(descriptor)
}

/// Inspects project XML; malformed documents yield an empty descriptor
pub fn parse_project_content(path: &Path, content: &str) -> ProjectDescriptor {
    let mut descriptor = ProjectDescriptor {
        path: path.to_path_buf(),
        ..Default::default()
    };

    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let doc = match roxmltree::Document::parse(content) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Project file is not well-formed XML");
            return descriptor;
        }
    };

    let root = doc.root_element();
    if root.has_tag_name("Project") {
        descriptor.sdk = root.attribute("Sdk").map(str::to_string);
    }

    let mut frameworks: Option<String> = None;

    for node in root.descendants().filter(|n| n.is_element()) {
        let text = node.text().map(str::trim).filter(|t| !t.is_empty());
        match node.tag_name().name() {
            "TargetFramework" if descriptor.target_framework.is_none() => {
                descriptor.target_framework = text.map(str::to_string);
            }
            "TargetFrameworks" if frameworks.is_none() => {
                frameworks = text
                    .and_then(|t| t.split(';').map(str::trim).find(|f| !f.is_empty()))
                    .map(str::to_string);
            }
            "OutputType" if descriptor.output_type.is_none() => {
                descriptor.output_type = text.map(str::to_string);
            }
            "ProjectTypeGuids" => {
                for guid in text.map(guids::parse_guid_list).unwrap_or_default() {
                    if !descriptor.project_type_guids.contains(&guid) {
                        descriptor.project_type_guids.push(guid);
                    }
                }
            }
            "FrameworkReference" => {
                if let Some(include) = node.attribute("Include") {
                    descriptor.framework_references.push(include.trim().to_string());
                }
            }
            _ => {}
        }
    }

    if descriptor.target_framework.is_none() {
        descriptor.target_framework = frameworks;
    }

    descriptor
}
