//! Per-resolution file listing cache
//!
//! A resolution pass asks for "all solutions", "all project files",
//! "project files next to this solution" and so on, many of them over the
//! same directory. [`RepositorySnapshot`] walks each `(directory, scope)`
//! pair once and filters the cached listing by extension afterwards.
//!
//! Snapshots are built fresh for every resolution; the tree may change
//! between pushes.

use crate::fs::{has_extension, FileSystem, SearchScope};
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Dependency-manager and VCS directories never searched for projects
pub const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "bower_components", "jspm_packages"];

type ListingKey = (PathBuf, SearchScope);

pub struct RepositorySnapshot<'a> {
    fs: &'a dyn FileSystem,
    root: PathBuf,
    listings: Mutex<HashMap<ListingKey, Arc<Vec<PathBuf>>>>,
}

impl<'a> RepositorySnapshot<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            listings: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &'a dyn FileSystem {
        self.fs
    }

    /// Every file below `dir` within `scope`, excluding dependency directories
    pub fn files(&self, dir: &Path, scope: SearchScope) -> Result<Arc<Vec<PathBuf>>> {
        let key = (dir.to_path_buf(), scope);

        if let Some(listing) = self.lock_listings().get(&key) {
            return Ok(Arc::clone(listing));
        }

        trace!(dir = %dir.display(), ?scope, "Walking directory");
        let listing = Arc::new(self.fs.list_files(dir, scope, EXCLUDED_DIRS)?);
        self.lock_listings().insert(key, Arc::clone(&listing));
        Ok(listing)
    }

    /// Files below `dir` with any of `extensions`, in listing order
    pub fn files_with_extensions(
        &self,
        dir: &Path,
        scope: SearchScope,
        extensions: &[&str],
    ) -> Result<Vec<PathBuf>> {
        Ok(self
            .files(dir, scope)?
            .iter()
            .filter(|path| extensions.iter().any(|ext| has_extension(path, ext)))
            .cloned()
            .collect())
    }

    fn lock_listings(&self) -> std::sync::MutexGuard<'_, HashMap<ListingKey, Arc<Vec<PathBuf>>>> {
        // A poisoned cache only ever holds complete listings.
        self.listings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
