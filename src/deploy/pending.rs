//! Pending deployment marker
//!
//! A zero-byte file under the deployments directory. Its existence alone
//! means "another trigger arrived while a deployment was running". Repeated
//! triggers overwrite the same file, so any number of them collapse into a
//! single follow-up cycle.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PENDING_FILENAME: &str = "pending";

#[derive(Debug, Clone)]
pub struct PendingMarker {
    path: PathBuf,
}

impl PendingMarker {
    pub fn new(deployments_path: &Path) -> Self {
        Self {
            path: deployments_path.join(PENDING_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    pub fn set(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, b"")?;
        debug!(marker = %self.path.display(), "Pending deployment marker set");
        Ok(())
    }

    /// Removes the marker, returning whether it was there
    pub fn take(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
