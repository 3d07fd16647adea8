//! Builder resolution
//!
//! Gates, in order:
//!
//! 1. run-from-package, pinned command, pinned generator arguments
//! 2. build disabled: basic (or OneDeploy) builder on the pinned path or repository root
//! 3. pinned project path: that path only, non-recursive
//! 4. exactly one solution: its first deployable project
//! 5. no solution: the one loose project file, then project.json, then
//!    a containing solution for websites
//! 6. signature detection, ending at the basic builder
//!
//! Two solutions or two loose project files are always fatal.

use super::error::ResolveError;
use super::selection::{BuilderKind, BuilderSelection, Resolution};
use crate::config::{DeploymentSettings, Platform};
use crate::detect::{DetectContext, DetectorRegistry, HostSignals, Signature};
use crate::fs::{FileSystem, SearchScope};
use crate::snapshot::RepositorySnapshot;
use crate::vs::{
    self, is_project_file, parse_project, parse_solution, ProjectDescriptor, SolutionDescriptor,
    PROJECT_EXTENSIONS,
};
use std::cell::OnceCell;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Deployer label of zip/OneDeploy pushes
pub const ONE_DEPLOY_DEPLOYER: &str = "OneDeploy";

/// Inputs of one resolution
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub repository_path: PathBuf,
    pub settings: DeploymentSettings,
    pub platform: Platform,
    pub host: HostSignals,
    pub deployer: Option<String>,
}

impl ResolveRequest {
    pub fn new(repository_path: impl Into<PathBuf>, settings: DeploymentSettings) -> Self {
        Self {
            repository_path: repository_path.into(),
            settings,
            platform: Platform::current(),
            host: HostSignals::from_env(),
            deployer: None,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_host(mut self, host: HostSignals) -> Self {
        self.host = host;
        self
    }

    pub fn with_deployer(mut self, deployer: impl Into<String>) -> Self {
        self.deployer = Some(deployer.into());
        self
    }

    fn is_one_deploy(&self) -> bool {
        self.deployer.as_deref() == Some(ONE_DEPLOY_DEPLOYER)
    }
}

/// Chooses the builder for a repository
#[derive(Clone, Default)]
pub struct BuilderResolver {
    detectors: DetectorRegistry,
}

impl BuilderResolver {
    pub fn new() -> Self {
        Self {
            detectors: DetectorRegistry::with_defaults(),
        }
    }

    pub fn with_detectors(detectors: DetectorRegistry) -> Self {
        Self { detectors }
    }

    pub fn resolve(
        &self,
        fs: &dyn FileSystem,
        request: &ResolveRequest,
    ) -> Result<BuilderSelection, ResolveError> {
        let pass = ResolutionPass {
            request,
            detectors: &self.detectors,
            snapshot: RepositorySnapshot::new(fs, &request.repository_path),
            solutions: OnceCell::new(),
        };
        let selection = pass.run()?;

        info!(
            builder = %selection.kind(),
            project = %selection.project_path().display(),
            solution = ?selection.solution_path(),
            "Selected builder"
        );
        Ok(selection)
    }
}

/// State shared by the tiers of one resolution
struct ResolutionPass<'a> {
    request: &'a ResolveRequest,
    detectors: &'a DetectorRegistry,
    snapshot: RepositorySnapshot<'a>,
    solutions: OnceCell<Vec<SolutionDescriptor>>,
}

impl<'a> ResolutionPass<'a> {
    fn repo(&self) -> &Path {
        &self.request.repository_path
    }

    fn fs(&self) -> &'a dyn FileSystem {
        self.snapshot.fs()
    }

    fn settings(&self) -> &DeploymentSettings {
        &self.request.settings
    }

    fn run(&self) -> Result<BuilderSelection, ResolveError> {
        let repo = self.repo();

        if self.settings().run_from_package() {
            return Ok(BuilderSelection::new(BuilderKind::RunFromPackage, repo, repo));
        }

        if let Some(command) = self.settings().command() {
            return Ok(BuilderSelection::new(BuilderKind::CustomCommand, repo, repo).with_command(command));
        }

        if let Some(args) = self.settings().script_generator_args() {
            return Ok(BuilderSelection::new(BuilderKind::CustomGenerator, repo, repo).with_command(args));
        }

        let target = self
            .settings()
            .project_path()
            .map(|p| resolve_project_path(repo, p));

        if !self.settings().build_during_deployment() {
            let site = target.as_deref().unwrap_or(repo);
            let kind = if self.request.is_one_deploy() {
                BuilderKind::OneDeploy
            } else {
                BuilderKind::Basic
            };
            debug!(site = %site.display(), "Build during deployment is disabled");
            return Ok(BuilderSelection::new(kind, repo, site));
        }

        if let Some(target) = target {
            debug!(project = %target.display(), "Using pinned project path");
            return self.resolve_project(&target, SearchScope::TopLevel, true);
        }

        let solutions = self.solutions()?;
        match solutions.len() {
            0 => self.resolve_project(repo, SearchScope::Recursive, false),
            1 => self.resolve_from_solution(&solutions[0]),
            _ => Err(ResolveError::AmbiguousSolutions {
                paths: solutions.iter().map(|s| s.path.clone()).collect(),
            }),
        }
    }

    /// Every solution in the repository, parsed once per pass
    fn solutions(&self) -> Result<&[SolutionDescriptor], ResolveError> {
        if let Some(solutions) = self.solutions.get() {
            return Ok(solutions.as_slice());
        }

        let paths = self.list(self.repo(), SearchScope::Recursive, &["sln"])?;
        let mut parsed = Vec::with_capacity(paths.len());
        for path in paths {
            let solution = parse_solution(self.fs(), &path).map_err(|e| ResolveError::SolutionParse {
                path: path.clone(),
                message: format!("{:#}", e),
            })?;
            parsed.push(solution);
        }

        Ok(self.solutions.get_or_init(|| parsed).as_slice())
    }

    fn list(&self, dir: &Path, scope: SearchScope, extensions: &[&str]) -> Result<Vec<PathBuf>, ResolveError> {
        self.snapshot
            .files_with_extensions(dir, scope, extensions)
            .map_err(|e| ResolveError::Listing {
                path: dir.to_path_buf(),
                message: format!("{:#}", e),
            })
    }

    fn load_project(&self, path: &Path) -> Result<ProjectDescriptor, ResolveError> {
        if !self.fs().is_file(path) {
            return Err(ResolveError::ProjectNotFound {
                path: path.to_path_buf(),
            });
        }
        parse_project(self.fs(), path, self.request.host.function_app_runtime).map_err(|e| {
            ResolveError::ProjectParse {
                path: path.to_path_buf(),
                message: format!("{:#}", e),
            }
        })
    }

    fn resolve_from_solution(&self, solution: &SolutionDescriptor) -> Result<BuilderSelection, ResolveError> {
        let mut descriptors = Vec::new();
        for project in &solution.projects {
            if project.is_web_site() {
                descriptors.push(ProjectDescriptor::web_site(&project.absolute_path));
            } else if is_project_file(&project.absolute_path) {
                descriptors.push(self.load_project(&project.absolute_path)?);
            }
        }

        let sln = Some(solution.path.as_path());

        if let Some(project) = descriptors.iter().find(|p| p.is_deployable()) {
            if let Resolution::Match(selection) = self.dispatch_project(project, sln) {
                return Ok(selection);
            }
        }

        if let Some(project) = descriptors.iter().find(|p| p.is_executable()) {
            return Ok(BuilderSelection::new(BuilderKind::DotNetConsole, self.repo(), &project.path)
                .with_solution(sln));
        }

        warn!(solution = %solution.path.display(), "No deployable projects found in solution");
        Ok(self.resolve_non_asp(solution.directory()))
    }

    /// Resolves a project file, or a directory that may hold one
    fn resolve_project(
        &self,
        target: &Path,
        scope: SearchScope,
        pinned: bool,
    ) -> Result<BuilderSelection, ResolveError> {
        if is_project_file(target) {
            return self.determine_project(target);
        }

        let projects = self.list(target, scope, PROJECT_EXTENSIONS)?;
        match projects.len() {
            0 => {}
            1 => return self.determine_project(&projects[0]),
            _ => return Err(ResolveError::AmbiguousProjects { paths: projects }),
        }

        if let Resolution::Match(selection) = self.aspnet_core_without_project(target, scope)? {
            return Ok(selection);
        }

        if let Resolution::Match(selection) = self.web_site_in_solution(target)? {
            return Ok(selection);
        }

        if pinned && !self.fs().is_dir(target) {
            return Err(ResolveError::ProjectNotFound {
                path: target.to_path_buf(),
            });
        }

        Ok(self.resolve_non_asp(target))
    }

    fn determine_project(&self, path: &Path) -> Result<BuilderSelection, ResolveError> {
        let project = self.load_project(path)?;
        let solution = self.containing_solution(path)?;

        match self.dispatch_project(&project, solution.as_deref()) {
            Resolution::Match(selection) => Ok(selection),
            Resolution::NoMatch => Err(ResolveError::ProjectNotDeployable {
                path: path.to_path_buf(),
            }),
        }
    }

    fn dispatch_project(&self, project: &ProjectDescriptor, solution: Option<&Path>) -> Resolution {
        let kind = if project.is_web_site {
            BuilderKind::WebSite
        } else if project.is_aspnet_core() {
            BuilderKind::AspNetCore
        } else if project.is_wap() {
            BuilderKind::Wap
        } else if project.is_function_app {
            BuilderKind::FunctionMsbuild
        } else if project.is_executable() {
            BuilderKind::DotNetConsole
        } else {
            return Resolution::NoMatch;
        };

        Resolution::Match(BuilderSelection::new(kind, self.repo(), &project.path).with_solution(solution))
    }

    /// The only solution in the repository that references `path`
    fn containing_solution(&self, path: &Path) -> Result<Option<PathBuf>, ResolveError> {
        let containing: Vec<&SolutionDescriptor> =
            self.solutions()?.iter().filter(|s| s.references(path)).collect();

        Ok(match containing.as_slice() {
            [only] => Some(only.path.clone()),
            _ => None,
        })
    }

    /// ASP.NET Core apps that predate project files carry only a `project.json`
    fn aspnet_core_without_project(&self, target: &Path, scope: SearchScope) -> Result<Resolution, ResolveError> {
        let candidates: Vec<PathBuf> = self
            .list(target, scope, &["json"])?
            .into_iter()
            .filter(|p| p.file_name().is_some_and(|n| n == "project.json"))
            .filter(|p| self.is_web_project_json(p))
            .collect();

        match candidates.as_slice() {
            [only] => Ok(Resolution::Match(BuilderSelection::new(
                BuilderKind::AspNetCore,
                self.repo(),
                only,
            ))),
            [] => Ok(Resolution::NoMatch),
            _ => {
                debug!(count = candidates.len(), "Several project.json files, not guessing");
                Ok(Resolution::NoMatch)
            }
        }
    }

    fn is_web_project_json(&self, path: &Path) -> bool {
        let Ok(content) = self.fs().read_to_string(path) else {
            return false;
        };
        let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) else {
            debug!(path = %path.display(), "Ignoring malformed project.json");
            return false;
        };
        json.get("dependencies")
            .and_then(|d| d.as_object())
            .is_some_and(|deps| deps.keys().any(|k| k.starts_with("Microsoft.AspNetCore")))
    }

    /// Website projects have no project file; a solution must point at them
    fn web_site_in_solution(&self, target: &Path) -> Result<Resolution, ResolveError> {
        let containing: Vec<&SolutionDescriptor> = self
            .solutions()?
            .iter()
            .filter(|s| {
                s.projects
                    .iter()
                    .any(|p| p.is_web_site() && vs::same_path(&p.absolute_path, target))
            })
            .collect();

        match containing.as_slice() {
            [] => Ok(Resolution::NoMatch),
            [only] => Ok(Resolution::Match(
                BuilderSelection::new(BuilderKind::WebSite, self.repo(), target)
                    .with_solution(Some(&only.path)),
            )),
            _ => Err(ResolveError::AmbiguousSolutions {
                paths: containing.iter().map(|s| s.path.clone()).collect(),
            }),
        }
    }

    /// Signature detection, ending at the basic builder
    fn resolve_non_asp(&self, site: &Path) -> BuilderSelection {
        let ctx = DetectContext::new(self.fs(), self.request.platform, &self.request.host);
        let kind = match self.detectors.first_match(&ctx, site) {
            Some(Signature::FunctionApp) => BuilderKind::FunctionBasic,
            Some(Signature::Node) => BuilderKind::Node,
            Some(Signature::Python) => BuilderKind::Python,
            Some(Signature::Go) => BuilderKind::Go,
            Some(Signature::Ruby) => BuilderKind::Ruby,
            Some(Signature::Php) => BuilderKind::Php,
            None => BuilderKind::Basic,
        };
        BuilderSelection::new(kind, self.repo(), site)
    }
}

/// Joins a user-supplied project path onto the repository root
fn resolve_project_path(repo: &Path, raw: &str) -> PathBuf {
    let normalized = if cfg!(windows) {
        raw.to_string()
    } else {
        raw.replace('\\', "/")
    };
    let relative = normalized.trim().trim_start_matches(['/', '\\']);

    repo.join(relative)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
