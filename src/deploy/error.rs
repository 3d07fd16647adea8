use super::lock::LockError;
use crate::builder::BuildError;
use crate::config::ConfigError;
use crate::resolve::ResolveError;
use std::path::PathBuf;
use thiserror::Error;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFLICT: i32 = 2;
pub const EXIT_RESOLUTION: i32 = 3;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Failed to record deployment: {0:#}")]
    Record(anyhow::Error),

    /// Filesystem work around a deployment: pending marker, target directory
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository operation failed: {0:#}")]
    Repository(anyhow::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DeployError {
    /// The build cannot succeed until the repository or its settings change
    pub fn is_resolution_fatal(&self) -> bool {
        matches!(self, DeployError::Resolve(_))
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Resolve(_) => EXIT_RESOLUTION,
            DeployError::Lock(e) if e.is_contention() => EXIT_CONFLICT,
            _ => EXIT_FAILURE,
        }
    }
}
