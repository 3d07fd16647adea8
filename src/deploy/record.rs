//! Deployment history on disk
//!
//! Layout under the deployments directory:
//!
//! ```text
//! <deployments>/
//!   active                  id of the last successful deployment
//!   <id>/status.json        DeploymentRecord
//!   <id>/manifest           files the deployment produced, one per line
//! ```

use crate::fs::{FileSystem, SearchScope};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const STATUS_FILE: &str = "status.json";
pub const MANIFEST_FILE: &str = "manifest";
pub const ACTIVE_FILE: &str = "active";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Building,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: String,
    pub deployer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub status: DeploymentStatus,
    pub received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Builder label, set once resolution succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fresh deployment id: the commit when known, a random id otherwise
pub fn deployment_id(commit_id: Option<&str>) -> String {
    match commit_id.map(str::trim).filter(|c| !c.is_empty()) {
        Some(commit) => commit.to_string(),
        None => Uuid::new_v4().simple().to_string(),
    }
}

impl DeploymentRecord {
    pub fn new(id: impl Into<String>, deployer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deployer: deployer.into(),
            message: None,
            author: None,
            status: DeploymentStatus::Pending,
            received_at: Utc::now(),
            start_time: None,
            end_time: None,
            builder: None,
            error: None,
        }
    }

    pub fn directory(deployments_path: &Path, id: &str) -> PathBuf {
        deployments_path.join(id)
    }

    pub fn manifest_path(deployments_path: &Path, id: &str) -> PathBuf {
        Self::directory(deployments_path, id).join(MANIFEST_FILE)
    }

    pub fn mark_building(&mut self) {
        self.status = DeploymentStatus::Building;
        self.start_time = Some(Utc::now());
    }

    pub fn mark_success(&mut self) {
        self.status = DeploymentStatus::Success;
        self.end_time = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = DeploymentStatus::Failed;
        self.error = Some(error.into());
        self.end_time = Some(Utc::now());
    }

    /// Writes `status.json`, replacing any previous version atomically
    pub fn save(&self, deployments_path: &Path) -> Result<()> {
        let dir = Self::directory(deployments_path, &self.id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create deployment directory {}", dir.display()))?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;
        let staging = dir.join(format!("{}.tmp", STATUS_FILE));
        let path = dir.join(STATUS_FILE);
        fs::write(&staging, content)
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        fs::rename(&staging, &path).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn load(deployments_path: &Path, id: &str) -> Result<Self> {
        let path = Self::directory(deployments_path, id).join(STATUS_FILE);
        let content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Malformed deployment record {}", path.display()))
    }
}

pub fn write_active(deployments_path: &Path, id: &str) -> Result<()> {
    let path = deployments_path.join(ACTIVE_FILE);
    fs::write(&path, id).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_active(deployments_path: &Path) -> Result<Option<String>> {
    let path = deployments_path.join(ACTIVE_FILE);
    match fs::read_to_string(&path) {
        Ok(id) => Ok(Some(id.trim().to_string()).filter(|id| !id.is_empty())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Manifest of the last successful deployment, if it is still on disk
pub fn previous_manifest(deployments_path: &Path) -> Result<Option<PathBuf>> {
    Ok(read_active(deployments_path)?
        .map(|id| DeploymentRecord::manifest_path(deployments_path, &id))
        .filter(|path| path.is_file()))
}

/// Records every file under `target` relative to it, one per line
pub fn write_manifest(filesystem: &dyn FileSystem, target: &Path, manifest: &Path) -> Result<usize> {
    let mut lines = String::new();
    let files = filesystem.list_files(target, SearchScope::Recursive, &[])?;
    for file in &files {
        if let Ok(relative) = file.strip_prefix(target) {
            let entry = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            lines.push_str(&entry);
            lines.push('\n');
        }
    }

    if let Some(parent) = manifest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(manifest, lines).with_context(|| format!("Failed to write manifest {}", manifest.display()))?;
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RealFileSystem;
    use tempfile::TempDir;

    #[test]
    fn test_record_lifecycle_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut record = DeploymentRecord::new("abc123", "GitHub");
        record.message = Some("Fix typo".to_string());
        record.save(temp.path()).unwrap();

        record.mark_building();
        record.builder = Some("Node.js".to_string());
        record.save(temp.path()).unwrap();
        record.mark_success();
        record.save(temp.path()).unwrap();

        let loaded = DeploymentRecord::load(temp.path(), "abc123").unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.status, DeploymentStatus::Success);
        assert!(loaded.start_time.is_some() && loaded.end_time.is_some());
        assert!(!temp.path().join("abc123").join("status.json.tmp").exists());
    }

    #[test]
    fn test_failed_record_keeps_error() {
        let temp = TempDir::new().unwrap();
        let mut record = DeploymentRecord::new("abc", "OneDeploy");
        record.mark_failed("exit code 1");
        record.save(temp.path()).unwrap();

        let json = fs::read_to_string(temp.path().join("abc").join(STATUS_FILE)).unwrap();
        assert!(json.contains("\"status\": \"failed\""));
        assert!(json.contains("exit code 1"));
    }

    #[test]
    fn test_active_and_previous_manifest() {
        let temp = TempDir::new().unwrap();
        assert_eq!(read_active(temp.path()).unwrap(), None);
        assert_eq!(previous_manifest(temp.path()).unwrap(), None);

        write_active(temp.path(), "abc").unwrap();
        assert_eq!(read_active(temp.path()).unwrap().as_deref(), Some("abc"));
        // Active id without a manifest on disk
        assert_eq!(previous_manifest(temp.path()).unwrap(), None);

        let manifest = DeploymentRecord::manifest_path(temp.path(), "abc");
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(&manifest, "index.html\n").unwrap();
        assert_eq!(previous_manifest(temp.path()).unwrap(), Some(manifest));
    }

    #[test]
    fn test_write_manifest_lists_relative_paths() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("wwwroot");
        fs::create_dir_all(target.join("css")).unwrap();
        fs::write(target.join("index.html"), "").unwrap();
        fs::write(target.join("css").join("site.css"), "").unwrap();

        let manifest = temp.path().join("deployments").join("abc").join(MANIFEST_FILE);
        let count = write_manifest(&RealFileSystem, &target, &manifest).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(&manifest).unwrap(), "css/site.css\nindex.html\n");
    }

    #[test]
    fn test_deployment_id() {
        assert_eq!(deployment_id(Some("abc123")), "abc123");
        assert_eq!(deployment_id(Some("  ")).len(), 32);
        assert_ne!(deployment_id(None), deployment_id(None));
    }
}
