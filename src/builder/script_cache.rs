//! Deployment script cache
//!
//! The generated script is reused only when the generator version and the
//! exact generator command line both match what produced it. The key file
//! holds exactly two lines, version then command line, and sits next to the
//! script in the deployments directory.
//!
//! Cache I/O never fails a build: read problems count as a miss, write
//! problems are logged.

use crate::config::Platform;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CACHE_KEY_FILE: &str = "deploymentCacheKey";

/// Result of checking the cache against the current inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss(MissReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    NoKey,
    NoScript,
    VersionChanged,
    CommandLineChanged,
    Unreadable,
}

impl MissReason {
    pub fn describe(self) -> &'static str {
        match self {
            MissReason::NoKey => "no cached deployment script",
            MissReason::NoScript => "cached deployment script is missing",
            MissReason::VersionChanged => "script generator version changed",
            MissReason::CommandLineChanged => "generator arguments changed",
            MissReason::Unreadable => "cache key could not be read",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentScriptCache {
    directory: PathBuf,
    script_name: &'static str,
}

impl DeploymentScriptCache {
    pub fn new(directory: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            directory: directory.into(),
            script_name: platform.deployment_script_name(),
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.directory.join(self.script_name)
    }

    pub fn key_path(&self) -> PathBuf {
        self.directory.join(CACHE_KEY_FILE)
    }

    pub fn lookup(&self, tool_version: &str, command_line: &str) -> CacheLookup {
        let key = match fs::read_to_string(self.key_path()) {
            Ok(key) => key,
            Err(e) if e.kind() == ErrorKind::NotFound => return CacheLookup::Miss(MissReason::NoKey),
            Err(e) => {
                warn!(path = %self.key_path().display(), error = %e, "Failed to read script cache key");
                return CacheLookup::Miss(MissReason::Unreadable);
            }
        };

        let mut lines = key.lines();
        let cached_version = lines.next().unwrap_or_default();
        let cached_command = lines.next().unwrap_or_default();

        if cached_version != tool_version {
            return CacheLookup::Miss(MissReason::VersionChanged);
        }
        if cached_command != command_line {
            return CacheLookup::Miss(MissReason::CommandLineChanged);
        }
        if !self.script_path().is_file() {
            return CacheLookup::Miss(MissReason::NoScript);
        }
        CacheLookup::Hit
    }

    /// Drops the key so a failed regeneration is never mistaken for a hit
    pub fn invalidate(&self) {
        match fs::remove_file(self.key_path()) {
            Ok(()) => debug!("Invalidated script cache"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.key_path().display(), error = %e, "Failed to invalidate script cache"),
        }
    }

    /// Records the inputs that produced the current script
    pub fn store(&self, tool_version: &str, command_line: &str) {
        if tool_version.contains('\n') || command_line.contains('\n') {
            warn!("Script cache inputs span multiple lines, not caching");
            return;
        }
        let result = fs::create_dir_all(&self.directory)
            .and_then(|_| fs::write(self.key_path(), format!("{}\n{}\n", tool_version, command_line)));
        if let Err(e) = result {
            warn!(path = %self.key_path().display(), error = %e, "Failed to write script cache key");
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}
