use super::BuildError;
use crate::config::{DeploymentSettings, EngineConfig, Platform};
use crate::deploy::Repository;
use crate::exec::{build_environment, DeploymentVariables, EnvironmentBlock, ToolPaths};
use crate::progress::{NoOpHandler, ProgressHandler};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Everything a builder needs for one deployment cycle
#[derive(Clone)]
pub struct BuildContext {
    pub repository_path: PathBuf,
    pub target_path: PathBuf,
    /// Holds the generated script and its cache key
    pub deployments_path: PathBuf,
    /// Parent of the per-run build temp directories
    pub temp_root: PathBuf,
    pub templates_path: PathBuf,
    pub script_generator: PathBuf,
    pub previous_manifest: Option<PathBuf>,
    pub next_manifest: Option<PathBuf>,
    pub commit_id: Option<String>,
    pub deployer: Option<String>,
    pub settings: DeploymentSettings,
    pub platform: Platform,
    pub tools: ToolPaths,
    pub progress: Arc<dyn ProgressHandler>,
    /// Source control, when the deployment came from a repository
    pub repository: Option<Arc<dyn Repository>>,
}

impl BuildContext {
    pub fn from_config(config: &EngineConfig, settings: DeploymentSettings) -> Self {
        Self {
            repository_path: config.repository_path.clone(),
            target_path: config.target_path.clone(),
            deployments_path: config.deployments_path.clone(),
            temp_root: config.temp_path.clone(),
            templates_path: config.templates_path.clone(),
            script_generator: config.script_generator.clone(),
            previous_manifest: None,
            next_manifest: None,
            commit_id: None,
            deployer: None,
            settings,
            platform: config.platform,
            tools: config.tools.clone(),
            progress: Arc::new(NoOpHandler),
            repository: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_manifests(mut self, previous: Option<PathBuf>, next: Option<PathBuf>) -> Self {
        self.previous_manifest = previous;
        self.next_manifest = next;
        self
    }

    pub fn with_commit(mut self, commit_id: Option<String>) -> Self {
        self.commit_id = commit_id;
        self
    }

    pub fn with_deployer(mut self, deployer: impl Into<String>) -> Self {
        self.deployer = Some(deployer.into());
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn idle_timeout(&self) -> Result<Duration, BuildError> {
        Ok(self.settings.command_idle_timeout()?)
    }

    pub fn progress(&self) -> &dyn ProgressHandler {
        self.progress.as_ref()
    }

    /// Child environment for a run using `build_temp`
    pub fn environment(&self, build_temp: &Path) -> EnvironmentBlock {
        let deployment = DeploymentVariables {
            source_path: self.repository_path.clone(),
            target_path: self.target_path.clone(),
            previous_manifest: self.previous_manifest.clone(),
            next_manifest: self.next_manifest.clone(),
            build_temp: Some(build_temp.to_path_buf()),
            commit_id: self.commit_id.clone(),
            tools: self.tools.clone(),
        };
        build_environment(&deployment, &self.settings)
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("repository_path", &self.repository_path)
            .field("target_path", &self.target_path)
            .field("deployments_path", &self.deployments_path)
            .field("commit_id", &self.commit_id)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}
