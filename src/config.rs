//! Configuration management for siteforge
//!
//! Two layers live here:
//!
//! - [`EngineConfig`]: where the engine keeps its state (repository checkout,
//!   deployment cache directory, deploy target, temp space) and which script
//!   generator it drives. Loaded from `SITEFORGE_*` environment variables
//!   with sensible defaults.
//! - [`DeploymentSettings`]: the per-site settings the resolution engine and
//!   builders consume read-only. Loaded from the process environment and
//!   overlaid with the repository's `.deployment` file.
//!
//! # Environment Variables
//!
//! ## Engine
//! - `SITEFORGE_REPOSITORY_PATH`: working tree the fetch step updates - default: `<data>/repository`
//! - `SITEFORGE_DEPLOYMENTS_PATH`: deployment cache directory - default: `<data>/deployments`
//! - `SITEFORGE_TARGET_PATH`: where builds are deployed - default: `<data>/wwwroot`
//! - `SITEFORGE_TEMP_PATH`: scratch space for build temp dirs - default: system temp dir
//! - `SITEFORGE_SCRIPT_GENERATOR`: script generator executable - default: `kuduscript`
//! - `SITEFORGE_TEMPLATES_PATH`: console worker templates - default: `<data>/templates`
//! - `SITEFORGE_FETCH_ATTEMPTS`: fetch attempts for transient errors - default: `3`
//! - `SITEFORGE_FETCH_RETRY_DELAY_MS`: delay between fetch attempts - default: `1000`
//! - `SITEFORGE_MSBUILD_PATH`, `SITEFORGE_NPM_JS_PATH`, `SITEFORGE_SYNC_CMD`,
//!   `SITEFORGE_SELECT_NODE_VERSION_CMD`: tool locations exported to generated scripts
//!
//! `<data>` is `dirs::data_local_dir()/siteforge`.
//!
//! ## Deployment settings
//! - `COMMAND`, `PROJECT`, `SCM_SCRIPT_GENERATOR_ARGS`, `SCM_DO_BUILD_DURING_DEPLOYMENT`,
//!   `SCM_COMMAND_IDLE_TIMEOUT`, `WEBSITE_RUN_FROM_PACKAGE`, `WEBSITE_RUN_FROM_ZIP`,
//!   `deployment_branch`, `WORKER_COMMAND`, and any `SCM_*` key.

use crate::exec::ToolPaths;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_SCRIPT_GENERATOR: &str = "kuduscript";
const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
const DEFAULT_FETCH_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_COMMAND_IDLE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_BRANCH: &str = "master";

/// Name of the per-repository settings file
pub const DEPLOYMENT_FILE: &str = ".deployment";

/// Well-known deployment setting keys
pub mod keys {
    pub const COMMAND: &str = "COMMAND";
    pub const PROJECT: &str = "PROJECT";
    pub const SCRIPT_GENERATOR_ARGS: &str = "SCM_SCRIPT_GENERATOR_ARGS";
    pub const BUILD_DURING_DEPLOYMENT: &str = "SCM_DO_BUILD_DURING_DEPLOYMENT";
    pub const COMMAND_IDLE_TIMEOUT: &str = "SCM_COMMAND_IDLE_TIMEOUT";
    pub const RUN_FROM_PACKAGE: &str = "WEBSITE_RUN_FROM_PACKAGE";
    pub const RUN_FROM_ZIP: &str = "WEBSITE_RUN_FROM_ZIP";
    pub const BRANCH: &str = "deployment_branch";
    pub const WORKER_COMMAND: &str = "WORKER_COMMAND";
}

const KNOWN_SETTING_KEYS: &[&str] = &[
    keys::COMMAND,
    keys::PROJECT,
    keys::SCRIPT_GENERATOR_ARGS,
    keys::BUILD_DURING_DEPLOYMENT,
    keys::COMMAND_IDLE_TIMEOUT,
    keys::RUN_FROM_PACKAGE,
    keys::RUN_FROM_ZIP,
    keys::BRANCH,
    keys::WORKER_COMMAND,
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Host platform, which gates the Linux-only detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn is_linux(self) -> bool {
        self == Platform::Linux
    }

    /// File name of the script the generator emits on this platform
    pub fn deployment_script_name(self) -> &'static str {
        match self {
            Platform::Windows => "deploy.cmd",
            _ => "deploy.sh",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Linux => write!(f, "linux"),
            Platform::Windows => write!(f, "windows"),
            Platform::Other => write!(f, "other"),
        }
    }
}

/// Engine-level configuration
///
/// Constructed with `Default::default()`, which reads `SITEFORGE_*`
/// environment variables, then adjusted with the `with_*` builders.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Working tree that fetch updates and builders read from
    pub repository_path: PathBuf,

    /// Per-repository deployment cache (script cache, pending marker, records, lock)
    pub deployments_path: PathBuf,

    /// Deployment target the builders write into
    pub target_path: PathBuf,

    /// Parent directory of per-build temp directories
    pub temp_path: PathBuf,

    /// Script generator executable
    pub script_generator: PathBuf,

    /// Console worker template directory
    pub templates_path: PathBuf,

    /// Total fetch attempts when the error is known to be transient
    pub fetch_attempts: u32,

    /// Fixed delay between fetch attempts
    pub fetch_retry_delay: Duration,

    /// Platform used for detector gating and script naming
    pub platform: Platform,

    /// Tool locations handed to generated scripts
    pub tools: ToolPaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(env::temp_dir)
            .join("siteforge");

        let path_var = |key: &str, fallback: PathBuf| {
            env::var(key).ok().map(PathBuf::from).unwrap_or(fallback)
        };

        let fetch_attempts = env::var("SITEFORGE_FETCH_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_FETCH_ATTEMPTS);

        let fetch_retry_delay_ms = env::var("SITEFORGE_FETCH_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FETCH_RETRY_DELAY_MS);

        Self {
            repository_path: path_var("SITEFORGE_REPOSITORY_PATH", data_dir.join("repository")),
            deployments_path: path_var("SITEFORGE_DEPLOYMENTS_PATH", data_dir.join("deployments")),
            target_path: path_var("SITEFORGE_TARGET_PATH", data_dir.join("wwwroot")),
            temp_path: path_var("SITEFORGE_TEMP_PATH", env::temp_dir()),
            script_generator: path_var(
                "SITEFORGE_SCRIPT_GENERATOR",
                PathBuf::from(DEFAULT_SCRIPT_GENERATOR),
            ),
            templates_path: path_var("SITEFORGE_TEMPLATES_PATH", data_dir.join("templates")),
            fetch_attempts,
            fetch_retry_delay: Duration::from_millis(fetch_retry_delay_ms),
            platform: Platform::current(),
            tools: ToolPaths {
                msbuild: env::var("SITEFORGE_MSBUILD_PATH").ok().map(PathBuf::from),
                npm_js: env::var("SITEFORGE_NPM_JS_PATH").ok().map(PathBuf::from),
                sync_command: env::var("SITEFORGE_SYNC_CMD").ok(),
                select_node_version_command: env::var("SITEFORGE_SELECT_NODE_VERSION_CMD").ok(),
            },
        }
    }
}

impl EngineConfig {
    /// Lays every engine directory out under `root`, for tests and embedding
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            repository_path: root.join("repository"),
            deployments_path: root.join("deployments"),
            target_path: root.join("wwwroot"),
            temp_path: root.join("temp"),
            templates_path: root.join("templates"),
            ..Self::default()
        }
    }

    pub fn with_repository_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository_path = path.into();
        self
    }

    pub fn with_deployments_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.deployments_path = path.into();
        self
    }

    pub fn with_target_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_path = path.into();
        self
    }

    pub fn with_script_generator(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_generator = path.into();
        self
    }

    pub fn with_fetch_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.fetch_attempts = attempts;
        self.fetch_retry_delay = delay;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_templates_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.templates_path = path.into();
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any value is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "Fetch attempts must be at least 1".to_string(),
            ));
        }
        if self.fetch_attempts > 10 {
            return Err(ConfigError::ValidationFailed(
                "Fetch attempts cannot exceed 10".to_string(),
            ));
        }
        if self.fetch_retry_delay > Duration::from_secs(60) {
            return Err(ConfigError::ValidationFailed(
                "Fetch retry delay cannot exceed 60 seconds".to_string(),
            ));
        }
        if self.repository_path == self.deployments_path {
            return Err(ConfigError::ValidationFailed(
                "Repository path and deployments path must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-site deployment settings, consumed read-only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentSettings {
    values: BTreeMap<String, String>,
}

impl DeploymentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the known setting keys and every `SCM_*` key from the process environment
    pub fn from_env() -> Self {
        let mut settings = Self::new();
        for (key, value) in env::vars() {
            if KNOWN_SETTING_KEYS.contains(&key.as_str()) || key.starts_with("SCM_") {
                settings.insert(key, value);
            }
        }
        settings
    }

    /// Overlays the `[config]` section of the repository's `.deployment` file
    ///
    /// A missing file leaves the settings unchanged; an unreadable one is
    /// logged and ignored.
    pub fn overlay_deployment_file(mut self, repository_root: &Path) -> Self {
        let path = repository_root.join(DEPLOYMENT_FILE);
        if !path.is_file() {
            return self;
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "Found .deployment file in repository");
                for (key, value) in parse_deployment_file(&content) {
                    self.insert(key, value);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read .deployment file");
            }
        }
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    /// Keys are case-insensitive; the latest spelling replaces earlier ones
    fn insert(&mut self, key: String, value: String) {
        self.values.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// All settings, in key order, for propagation into child environments
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn command(&self) -> Option<&str> {
        self.get(keys::COMMAND)
    }

    pub fn project_path(&self) -> Option<&str> {
        self.get(keys::PROJECT)
    }

    pub fn script_generator_args(&self) -> Option<&str> {
        self.get(keys::SCRIPT_GENERATOR_ARGS)
    }

    pub fn worker_command(&self) -> Option<&str> {
        self.get(keys::WORKER_COMMAND)
    }

    pub fn build_during_deployment(&self) -> bool {
        self.get(keys::BUILD_DURING_DEPLOYMENT)
            .and_then(parse_bool)
            .unwrap_or(true)
    }

    pub fn run_from_package(&self) -> bool {
        [keys::RUN_FROM_PACKAGE, keys::RUN_FROM_ZIP]
            .iter()
            .any(|k| self.get(k).is_some_and(|v| v.trim() == "1"))
    }

    pub fn command_idle_timeout(&self) -> Result<Duration, ConfigError> {
        match self.get(keys::COMMAND_IDLE_TIMEOUT) {
            None => Ok(Duration::from_secs(DEFAULT_COMMAND_IDLE_TIMEOUT_SECS)),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::ParseError {
                    field: keys::COMMAND_IDLE_TIMEOUT.to_string(),
                    error: e.to_string(),
                }),
        }
    }

    pub fn target_branch(&self) -> &str {
        self.get(keys::BRANCH).unwrap_or(DEFAULT_BRANCH)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parses the `[config]` section of a `.deployment` file
///
/// Lines are `key = value`; `;` and `#` start comments; keys in other
/// sections are ignored.
pub fn parse_deployment_file(content: &str) -> Vec<(String, String)> {
    let mut in_config = false;
    let mut values = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            in_config = line[1..line.len() - 1].trim().eq_ignore_ascii_case("config");
            continue;
        }

        if !in_config {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                values.push((key.to_string(), value.trim().to_string()));
            }
        }
    }

    values
}
