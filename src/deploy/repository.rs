//! Source control capability
//!
//! The orchestrator only needs to bring the working tree to a commit and
//! describe it. [`GitRepository`] drives the `git` binary through the
//! execution shim; tests substitute their own implementation.

use crate::exec::{EnvironmentBlock, ExecError, Executable};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Commit metadata recorded with a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChangeSet {
    pub fn author(&self) -> String {
        if self.author_email.is_empty() {
            self.author_name.clone()
        } else {
            format!("{} <{}>", self.author_name, self.author_email)
        }
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Fetches `branch` from `url` into the local repository
    async fn fetch(&self, url: &str, branch: &str) -> Result<()>;

    /// Describes `reference`, a commit id or the fetched head
    async fn change_set(&self, reference: &str) -> Result<ChangeSet>;

    /// Forces the working tree to `reference`
    async fn update(&self, reference: &str) -> Result<()>;

    /// Whether `path`, relative to the repository root, is under source control
    async fn is_tracked(&self, path: &Path) -> Result<bool>;

    fn path(&self) -> &Path;
}

/// Reference that names the most recent fetch
pub const FETCH_HEAD: &str = "FETCH_HEAD";

const FIELD_SEPARATOR: char = '\u{1f}';

pub struct GitRepository {
    path: PathBuf,
    git: PathBuf,
    idle_timeout: Duration,
}

impl GitRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            git: PathBuf::from("git"),
            idle_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn executable(&self) -> Executable {
        let mut environment = EnvironmentBlock::from_process();
        environment.set("GIT_TERMINAL_PROMPT", "0");
        Executable::new(&self.git, &self.path, self.idle_timeout).with_environment(environment)
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        debug!(args = ?args, repo = %self.path.display(), "Running git");
        match self.executable().execute(args).await {
            Ok(output) => Ok(output.stdout),
            Err(ExecError::NonZeroExit { code, output, .. }) => Err(anyhow!(
                "git {} failed with code {}: {}",
                args.first().copied().unwrap_or_default(),
                code,
                output.stderr.trim()
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_initialized(&self) -> Result<()> {
        if self.path.join(".git").exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("Failed to create repository {}", self.path.display()))?;
        info!(repo = %self.path.display(), "Initializing repository");
        self.git(&["init", "--quiet"]).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for GitRepository {
    async fn fetch(&self, url: &str, branch: &str) -> Result<()> {
        self.ensure_initialized().await?;
        let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", branch);
        self.git(&["fetch", "--quiet", url, &refspec]).await?;
        Ok(())
    }

    async fn change_set(&self, reference: &str) -> Result<ChangeSet> {
        let format = format!("--format=%H{0}%an{0}%ae{0}%cI{0}%B", FIELD_SEPARATOR);
        let stdout = self.git(&["log", "-n", "1", &format, reference, "--"]).await?;
        parse_change_set(&stdout)
    }

    async fn update(&self, reference: &str) -> Result<()> {
        self.git(&["reset", "--hard", "--quiet", reference]).await?;
        self.git(&["clean", "-d", "-f", "-q"]).await?;
        Ok(())
    }

    async fn is_tracked(&self, path: &Path) -> Result<bool> {
        let path = path.to_string_lossy();
        match self.executable().execute(["ls-files", "--error-unmatch", "--", &*path]).await {
            Ok(_) => Ok(true),
            Err(ExecError::NonZeroExit { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_change_set(stdout: &str) -> Result<ChangeSet> {
    let mut fields = stdout.splitn(5, FIELD_SEPARATOR);
    let (Some(id), Some(name), Some(email), Some(timestamp), Some(message)) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        bail!("Unexpected git log output: {}", stdout.trim());
    };

    let timestamp = DateTime::parse_from_rfc3339(timestamp.trim())
        .with_context(|| format!("Invalid commit timestamp {}", timestamp))?
        .with_timezone(&Utc);

    Ok(ChangeSet {
        id: id.trim().to_string(),
        author_name: name.to_string(),
        author_email: email.to_string(),
        message: message.trim().to_string(),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    #[test]
    fn test_parse_change_set() {
        let out = "0123abc\u{1f}Jane Doe\u{1f}jane@example.com\u{1f}2024-03-01T10:00:00+01:00\u{1f}Fix typo\n\nBody\n";
        let change = parse_change_set(out).unwrap();
        assert_eq!(change.id, "0123abc");
        assert_eq!(change.author(), "Jane Doe <jane@example.com>");
        assert_eq!(change.message, "Fix typo\n\nBody");
        assert_eq!(change.timestamp.to_rfc3339(), "2024-03-01T09:00:00+00:00");
    }

    #[test]
    fn test_parse_change_set_rejects_garbage() {
        assert!(parse_change_set("not a log line").is_err());
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {:?} failed", args);
    }

    #[tokio::test]
    async fn test_fetch_update_and_tracking() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let upstream = temp.path().join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        git(&upstream, &["init", "--quiet"]);
        git(&upstream, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        std::fs::write(upstream.join("package.json"), "{}").unwrap();
        git(&upstream, &["add", "."]);
        git(&upstream, &["commit", "--quiet", "-m", "Initial commit"]);

        let repo = GitRepository::new(temp.path().join("checkout"));
        repo.fetch(upstream.to_str().unwrap(), "main").await.unwrap();

        let change = repo.change_set(FETCH_HEAD).await.unwrap();
        assert_eq!(change.message, "Initial commit");
        assert_eq!(change.author_name, "Test");

        repo.update(&change.id).await.unwrap();
        assert!(repo.path().join("package.json").is_file());

        std::fs::write(repo.path().join("web.config"), "<configuration />").unwrap();
        assert!(repo.is_tracked(Path::new("package.json")).await.unwrap());
        assert!(!repo.is_tracked(Path::new("web.config")).await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_missing_branch_fails() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let upstream = temp.path().join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        git(&upstream, &["init", "--quiet"]);

        let repo = GitRepository::new(temp.path().join("checkout"));
        let err = repo.fetch(upstream.to_str().unwrap(), "nope").await.unwrap_err();
        assert!(err.to_string().contains("git fetch failed"));
    }
}
