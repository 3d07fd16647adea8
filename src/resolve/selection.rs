use serde::Serialize;
use std::path::{Path, PathBuf};

crate::define_id_enum! {
    /// Every builder the engine can dispatch to
    BuilderKind {
        Wap => "wap" : "ASP.NET Web Application",
        WebSite => "website" : "ASP.NET Web Site",
        AspNetCore => "aspnetcore" : "ASP.NET Core",
        FunctionMsbuild => "function_msbuild" : "Function App (MSBuild)",
        DotNetConsole => "dotnet_console" : ".NET Console Worker",
        Node => "node" : "Node.js",
        Python => "python" : "Python",
        Go => "go" : "Go",
        Ruby => "ruby" : "Ruby",
        Php => "php" : "PHP",
        FunctionBasic => "function_basic" : "Function App",
        Basic => "basic" : "Basic Web Site",
        CustomGenerator => "custom_generator" : "Custom Script Generator",
        CustomCommand => "custom_command" : "Custom Deployment Command",
        RunFromPackage => "run_from_package" : "Run From Package",
        OneDeploy => "one_deploy" : "OneDeploy",
    }
}

/// The builder chosen for one deployment attempt
///
/// Built only by the resolver and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuilderSelection {
    kind: BuilderKind,
    repository_path: PathBuf,
    /// Project file for MSBuild kinds, site directory otherwise
    project_path: PathBuf,
    solution_path: Option<PathBuf>,
    /// Custom command or custom generator arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
}

impl BuilderSelection {
    pub(crate) fn new(kind: BuilderKind, repository_path: &Path, project_path: &Path) -> Self {
        Self {
            kind,
            repository_path: repository_path.to_path_buf(),
            project_path: project_path.to_path_buf(),
            solution_path: None,
            command: None,
        }
    }

    pub(crate) fn with_solution(mut self, solution_path: Option<&Path>) -> Self {
        self.solution_path = solution_path.map(Path::to_path_buf);
        self
    }

    pub(crate) fn with_command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }

    pub fn kind(&self) -> BuilderKind {
        self.kind
    }

    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn solution_path(&self) -> Option<&Path> {
        self.solution_path.as_deref()
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Descriptive label for logs and deployment records
    pub fn project_type(&self) -> &'static str {
        self.kind.name()
    }
}

/// Outcome of one resolution tier
#[derive(Debug)]
pub(crate) enum Resolution {
    Match(BuilderSelection),
    NoMatch,
}
