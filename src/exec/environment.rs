//! Environment blocks for child processes
//!
//! Layers, later ones winning:
//!
//! 1. the engine's own process environment
//! 2. well-known deployment variables (paths, commit, manifests, tools)
//! 3. deployment settings, which users control
//!
//! Every setting that overrides a computed value is logged.

use crate::config::DeploymentSettings;
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod vars {
    pub const SOURCE_PATH: &str = "DEPLOYMENT_SOURCE";
    pub const TARGET_PATH: &str = "DEPLOYMENT_TARGET";
    pub const PREVIOUS_MANIFEST_PATH: &str = "PREVIOUS_MANIFEST_PATH";
    pub const NEXT_MANIFEST_PATH: &str = "NEXT_MANIFEST_PATH";
    pub const BUILD_TEMP_PATH: &str = "DEPLOYMENT_TEMP";
    pub const COMMIT_ID: &str = "SCM_COMMIT_ID";
    pub const IN_PLACE_DEPLOYMENT: &str = "IN_PLACE_DEPLOYMENT";
    pub const MSBUILD_PATH: &str = "MSBUILD_PATH";
    pub const NPM_JS_PATH: &str = "NPM_JS_PATH";
    pub const SYNC_COMMAND: &str = "KUDU_SYNC_CMD";
    pub const SELECT_NODE_VERSION_COMMAND: &str = "KUDU_SELECT_NODE_VERSION_CMD";
    pub const NUGET_PACKAGE_RESTORE: &str = "EnableNuGetPackageRestore";
    pub const PATH: &str = "PATH";
}

/// Substrings that mark a setting value as not fit for logs
const SECRET_MARKERS: &[&str] = &["PASSWORD", "SECRET", "TOKEN", "KEY", "CONNECTION"];

/// Executables and scripts the generated deployment scripts call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    pub msbuild: Option<PathBuf>,
    pub npm_js: Option<PathBuf>,
    pub sync_command: Option<String>,
    pub select_node_version_command: Option<String>,
}

/// Computed per-run deployment variables
#[derive(Debug, Clone, Default)]
pub struct DeploymentVariables {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub previous_manifest: Option<PathBuf>,
    pub next_manifest: Option<PathBuf>,
    pub build_temp: Option<PathBuf>,
    pub commit_id: Option<String>,
    pub tools: ToolPaths,
}

/// A complete environment for one child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentBlock {
    vars: BTreeMap<String, String>,
}

impl EnvironmentBlock {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot of this process's environment, skipping non-UTF-8 entries
    pub fn from_process() -> Self {
        Self {
            vars: env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Prepends directories to `PATH`, skipping ones already present
    pub fn prepend_path(&mut self, dirs: &[PathBuf]) {
        let current = self.get(vars::PATH).map(OsString::from).unwrap_or_default();
        let mut entries: Vec<PathBuf> = env::split_paths(&current)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        for dir in dirs.iter().rev() {
            if !entries.contains(dir) {
                entries.insert(0, dir.clone());
            }
        }
        if let Ok(joined) = env::join_paths(entries) {
            if let Ok(joined) = joined.into_string() {
                self.set(vars::PATH, joined);
            }
        }
    }

    /// Applies the deployment variables on top of the current contents
    pub fn with_deployment_variables(mut self, deployment: &DeploymentVariables) -> Self {
        let path = |p: &Path| p.display().to_string();

        self.set(vars::SOURCE_PATH, path(&deployment.source_path));
        self.set(vars::TARGET_PATH, path(&deployment.target_path));
        self.set(
            vars::PREVIOUS_MANIFEST_PATH,
            deployment.previous_manifest.as_deref().map(path).unwrap_or_default(),
        );
        if let Some(next) = &deployment.next_manifest {
            self.set(vars::NEXT_MANIFEST_PATH, path(next));
        }
        if let Some(temp) = &deployment.build_temp {
            self.set(vars::BUILD_TEMP_PATH, path(temp));
        }
        if let Some(commit) = &deployment.commit_id {
            self.set(vars::COMMIT_ID, commit.clone());
        }
        if deployment.source_path == deployment.target_path {
            self.set(vars::IN_PLACE_DEPLOYMENT, "1");
        }
        self.set(vars::NUGET_PACKAGE_RESTORE, "true");

        let tools = &deployment.tools;
        let mut tool_dirs = Vec::new();
        if let Some(msbuild) = &tools.msbuild {
            self.set(vars::MSBUILD_PATH, path(msbuild));
            tool_dirs.extend(msbuild.parent().map(Path::to_path_buf));
        }
        if let Some(npm) = &tools.npm_js {
            self.set(vars::NPM_JS_PATH, path(npm));
        }
        if let Some(sync) = &tools.sync_command {
            self.set(vars::SYNC_COMMAND, sync.clone());
        }
        if let Some(select) = &tools.select_node_version_command {
            self.set(vars::SELECT_NODE_VERSION_COMMAND, select.clone());
        }
        if !tool_dirs.is_empty() {
            self.prepend_path(&tool_dirs);
        }

        self
    }

    /// Applies deployment settings last; they always win
    pub fn with_settings(mut self, settings: &DeploymentSettings) -> Self {
        for (key, value) in settings.iter() {
            let previous = self.set(key, value);
            if previous.as_deref() == Some(value) {
                continue;
            }
            if looks_secret(key) {
                debug!(key = %key, overridden = previous.is_some(), "Applied deployment setting");
            } else {
                debug!(
                    key = %key,
                    value = %value,
                    overridden = previous.is_some(),
                    "Applied deployment setting"
                );
            }
        }
        self
    }

    /// Replaces the command's environment with this block
    pub fn apply(&self, command: &mut tokio::process::Command) {
        command.env_clear();
        command.envs(&self.vars);
    }
}

fn looks_secret(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    SECRET_MARKERS.iter().any(|m| upper.contains(m))
}

/// Builds the full environment: process defaults, then deployment variables, then settings
pub fn build_environment(deployment: &DeploymentVariables, settings: &DeploymentSettings) -> EnvironmentBlock {
    EnvironmentBlock::from_process()
        .with_deployment_variables(deployment)
        .with_settings(settings)
}
