//! Deployment orchestration
//!
//! One [`DeploymentOrchestrator`] serves one repository. A trigger either
//! takes the repository's deployment lock and runs fetch, build and manifest
//! sync, or finds the lock held, leaves a pending marker behind and returns
//! at once. The lock holder drains the marker before it leaves, so a burst
//! of triggers collapses into a single follow-up cycle that deploys the
//! latest branch head.

use super::error::{DeployError, EXIT_CONFLICT, EXIT_SUCCESS};
use super::lock::DeploymentLock;
use super::pending::PendingMarker;
use super::record::{self, deployment_id, DeploymentRecord};
use super::repository::{Repository, FETCH_HEAD};
use super::retry::RetryPolicy;
use super::trigger::DeploymentTrigger;
use crate::builder::{BuildContext, SiteBuilder};
use crate::config::{DeploymentSettings, EngineConfig};
use crate::detect::HostSignals;
use crate::fs::{FileSystem, RealFileSystem};
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};
use crate::resolve::{BuilderResolver, BuilderSelection, ResolveRequest};
use async_trait::async_trait;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Resolves and builds a fetched working tree
#[async_trait]
pub trait BuildRunner: Send + Sync {
    async fn build(&self, ctx: &BuildContext) -> Result<BuilderSelection, DeployError>;
}

/// Resolution followed by the selected [`SiteBuilder`]
pub struct SiteBuildRunner {
    fs: Arc<dyn FileSystem>,
    resolver: BuilderResolver,
    host: HostSignals,
}

impl SiteBuildRunner {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(RealFileSystem),
            resolver: BuilderResolver::new(),
            host: HostSignals::from_env(),
        }
    }

    pub fn with_host(mut self, host: HostSignals) -> Self {
        self.host = host;
        self
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }
}

impl Default for SiteBuildRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildRunner for SiteBuildRunner {
    async fn build(&self, ctx: &BuildContext) -> Result<BuilderSelection, DeployError> {
        let mut request = ResolveRequest::new(&ctx.repository_path, ctx.settings.clone())
            .with_platform(ctx.platform)
            .with_host(self.host);
        if let Some(deployer) = &ctx.deployer {
            request = request.with_deployer(deployer.as_str());
        }

        let selection = self.resolver.resolve(self.fs.as_ref(), &request)?;
        ctx.progress().on_progress(&ProgressEvent::BuilderSelected {
            kind: selection.kind().to_string(),
            project_path: selection.project_path().display().to_string(),
        });

        SiteBuilder::new(selection.clone()).build(ctx).await?;
        Ok(selection)
    }
}

/// What a trigger amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// This trigger held the lock; `cycles` counts the drained follow-ups too
    Deployed { id: String, cycles: u32 },
    /// Another deployment was running; a pending marker was left for it
    Queued,
}

impl DeploymentOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            DeploymentOutcome::Deployed { .. } => EXIT_SUCCESS,
            DeploymentOutcome::Queued => EXIT_CONFLICT,
        }
    }
}

pub struct DeploymentOrchestrator {
    config: EngineConfig,
    settings: DeploymentSettings,
    repository: Arc<dyn Repository>,
    runner: Arc<dyn BuildRunner>,
    progress: Arc<dyn ProgressHandler>,
    fs: Arc<dyn FileSystem>,
}

impl DeploymentOrchestrator {
    pub fn new(config: EngineConfig, repository: Arc<dyn Repository>) -> Self {
        Self {
            config,
            settings: DeploymentSettings::from_env(),
            repository,
            runner: Arc::new(SiteBuildRunner::new()),
            progress: Arc::new(LoggingHandler),
            fs: Arc::new(RealFileSystem),
        }
    }

    /// Base settings; the repository's `.deployment` file is layered on top each cycle
    pub fn with_settings(mut self, settings: DeploymentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn BuildRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handles one trigger
    ///
    /// Never blocks on the lock. When the cycles run, the result reflects the
    /// last one: earlier failures are recorded and reported but do not stop
    /// the drain.
    pub async fn deploy(&self, trigger: &DeploymentTrigger) -> Result<DeploymentOutcome, DeployError> {
        let deployments = &self.config.deployments_path;
        let pending = PendingMarker::new(deployments);
        let owner = format!("{} ({})", trigger.deployer, trigger.branch);

        let Some(lock) = self.acquire_or_queue(trigger, &owner, &pending)? else {
            return Ok(DeploymentOutcome::Queued);
        };

        // A marker left before this trigger took the lock is covered by this cycle
        take_pending(&pending)?;

        let mut cycles = 0;
        let mut last = self.drain(trigger.clone(), &pending, &mut cycles).await?;
        drop(lock);

        // A trigger may have queued between the last check and the release
        while pending.is_set() {
            let lock = match DeploymentLock::try_acquire(deployments, &owner) {
                Ok(lock) => lock,
                Err(e) if e.is_contention() => {
                    debug!("Pending marker left to the current lock holder");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            if take_pending(&pending)? {
                self.progress.on_progress(&ProgressEvent::PendingDrained);
                last = self.drain(follow_up(trigger), &pending, &mut cycles).await?;
            }
            drop(lock);
        }

        last.map(|id| DeploymentOutcome::Deployed { id, cycles })
    }

    /// Takes the lock, or leaves a pending marker for whoever holds it
    ///
    /// The holder may have made its last marker check before the marker was
    /// set, so the lock is tried once more afterwards. Whoever gets it then
    /// owns the marker.
    fn acquire_or_queue(
        &self,
        trigger: &DeploymentTrigger,
        owner: &str,
        pending: &PendingMarker,
    ) -> Result<Option<DeploymentLock>, DeployError> {
        let deployments = &self.config.deployments_path;
        match DeploymentLock::try_acquire(deployments, owner) {
            Ok(lock) => return Ok(Some(lock)),
            Err(e) if e.is_contention() => info!(error = %e, "Deployment in progress, queueing"),
            Err(e) => return Err(e.into()),
        }

        pending.set().map_err(|source| DeployError::Io {
            path: pending.path().to_path_buf(),
            source,
        })?;
        self.progress.on_progress(&ProgressEvent::PendingQueued {
            repository: trigger.repository_url.clone(),
        });

        match DeploymentLock::try_acquire(deployments, owner) {
            Ok(lock) => {
                debug!("Lock released while queueing, draining the marker here");
                Ok(Some(lock))
            }
            Err(e) if e.is_contention() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs cycles until no pending marker is left; the caller holds the lock
    ///
    /// The outer error is for marker I/O, the inner result is the last cycle's.
    async fn drain(
        &self,
        mut current: DeploymentTrigger,
        pending: &PendingMarker,
        cycles: &mut u32,
    ) -> Result<Result<String, DeployError>, DeployError> {
        loop {
            *cycles += 1;
            let result = self.run_cycle(&current).await;
            if !take_pending(pending)? {
                return Ok(result);
            }
            self.progress.on_progress(&ProgressEvent::PendingDrained);
            current = follow_up(&current);
        }
    }

    /// fetch, record, build, manifest sync
    async fn run_cycle(&self, trigger: &DeploymentTrigger) -> Result<String, DeployError> {
        let started = Instant::now();
        let deployments = &self.config.deployments_path;

        let policy = RetryPolicy::new(self.config.fetch_attempts, self.config.fetch_retry_delay);
        let repository = &self.repository;
        let url = trigger.repository_url.as_str();
        let branch = trigger.branch.as_str();
        policy
            .run(self.progress.as_ref(), move || repository.fetch(url, branch))
            .await
            .map_err(DeployError::Fetch)?;

        let reference = trigger.commit_id.as_deref().unwrap_or(FETCH_HEAD);
        let change = self
            .repository
            .change_set(reference)
            .await
            .map_err(DeployError::Repository)?;
        self.repository
            .update(&change.id)
            .await
            .map_err(DeployError::Repository)?;

        let id = deployment_id(Some(&change.id));
        self.progress.on_progress(&ProgressEvent::DeploymentStarted {
            id: id.clone(),
            deployer: trigger.deployer.clone(),
        });

        let mut record = DeploymentRecord::new(&id, &trigger.deployer);
        record.message = Some(change.message.clone()).filter(|m| !m.is_empty());
        record.author = Some(change.author()).filter(|a| !a.is_empty());
        record.save(deployments).map_err(DeployError::Record)?;
        record.mark_building();
        record.save(deployments).map_err(DeployError::Record)?;

        let result = self.build_and_sync(trigger, &id, &mut record).await;
        match &result {
            Ok(()) => {
                record.mark_success();
                self.progress.on_progress(&ProgressEvent::DeploymentCompleted {
                    id: id.clone(),
                    duration: started.elapsed(),
                });
            }
            Err(e) => {
                record.mark_failed(e.to_string());
                self.progress.on_progress(&ProgressEvent::DeploymentFailed {
                    id: id.clone(),
                    error: e.to_string(),
                });
            }
        }
        if let Err(e) = record.save(deployments) {
            warn!(id = %id, error = %format!("{:#}", e), "Failed to save final deployment status");
        }

        result.map(|()| id)
    }

    async fn build_and_sync(
        &self,
        trigger: &DeploymentTrigger,
        id: &str,
        record: &mut DeploymentRecord,
    ) -> Result<(), DeployError> {
        let deployments = &self.config.deployments_path;
        let settings = self
            .settings
            .clone()
            .overlay_deployment_file(&self.config.repository_path);
        let previous = record::previous_manifest(deployments).map_err(DeployError::Record)?;
        let next = DeploymentRecord::manifest_path(deployments, id);

        let ctx = BuildContext::from_config(&self.config, settings)
            .with_progress(self.progress.clone())
            .with_manifests(previous, Some(next.clone()))
            .with_commit(Some(id.to_string()))
            .with_deployer(&trigger.deployer)
            .with_repository(self.repository.clone());

        let target = &self.config.target_path;
        fs::create_dir_all(target).map_err(|source| DeployError::Io {
            path: target.clone(),
            source,
        })?;

        let selection = self.runner.build(&ctx).await?;
        record.builder = Some(selection.project_type().to_string());

        let files = record::write_manifest(self.fs.as_ref(), target, &next).map_err(DeployError::Record)?;
        record::write_active(deployments, id).map_err(DeployError::Record)?;
        info!(id = %id, files, builder = %selection.kind(), "Deployment synced");
        Ok(())
    }
}

fn take_pending(pending: &PendingMarker) -> Result<bool, DeployError> {
    pending.take().map_err(|source| DeployError::Io {
        path: pending.path().to_path_buf(),
        source,
    })
}

/// Drained cycles deploy whatever the branch head is by then
fn follow_up(trigger: &DeploymentTrigger) -> DeploymentTrigger {
    DeploymentTrigger {
        commit_id: None,
        ..trigger.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{keys, Platform};
    use crate::deploy::repository::ChangeSet;
    use crate::deploy::DeploymentStatus;
    use crate::progress::CollectingHandler;
    use crate::resolve::BuilderKind;
    use anyhow::{anyhow, Result};
    use chrono::Utc;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Repository whose head advances on every fetch
    struct FakeRepository {
        path: PathBuf,
        fetches: AtomicU32,
        fail_fetch: Option<&'static str>,
    }

    impl FakeRepository {
        fn new(path: &Path) -> Self {
            Self {
                path: path.to_path_buf(),
                fetches: AtomicU32::new(0),
                fail_fetch: None,
            }
        }
    }

    #[async_trait]
    impl Repository for FakeRepository {
        async fn fetch(&self, _url: &str, _branch: &str) -> Result<()> {
            if let Some(message) = self.fail_fetch {
                return Err(anyhow!(message));
            }
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn change_set(&self, reference: &str) -> Result<ChangeSet> {
            let id = if reference == FETCH_HEAD {
                format!("commit{}", self.fetches.load(Ordering::SeqCst))
            } else {
                reference.to_string()
            };
            Ok(ChangeSet {
                id,
                author_name: "Dev".to_string(),
                author_email: "dev@example.com".to_string(),
                message: "Update site".to_string(),
                timestamp: Utc::now(),
            })
        }

        async fn update(&self, _reference: &str) -> Result<()> {
            Ok(())
        }

        async fn is_tracked(&self, _path: &Path) -> Result<bool> {
            Ok(false)
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    /// Writes a file into the target; can fail or queue a trigger on given runs
    struct ScriptedRunner {
        runs: AtomicU32,
        fail_on: Vec<u32>,
        queue_on: Vec<u32>,
        seen: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedRunner {
        fn new() -> Self {
            Self {
                runs: AtomicU32::new(0),
                fail_on: Vec::new(),
                queue_on: Vec::new(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BuildRunner for ScriptedRunner {
        async fn build(&self, ctx: &BuildContext) -> Result<BuilderSelection, DeployError> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().unwrap().push(ctx.commit_id.clone());
            if self.queue_on.contains(&run) {
                PendingMarker::new(&ctx.deployments_path).set().unwrap();
            }
            if self.fail_on.contains(&run) {
                return Err(DeployError::Repository(anyhow!("build {} broke", run)));
            }
            fs::create_dir_all(&ctx.target_path).unwrap();
            fs::write(ctx.target_path.join("index.html"), format!("run {}", run)).unwrap();
            Ok(BuilderSelection::new(
                BuilderKind::Basic,
                &ctx.repository_path,
                &ctx.repository_path,
            ))
        }
    }

    struct Site {
        _temp: TempDir,
        config: EngineConfig,
        progress: Arc<CollectingHandler>,
    }

    impl Site {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let config = EngineConfig::rooted_at(temp.path())
                .with_platform(Platform::Linux)
                .with_fetch_retry(3, std::time::Duration::from_millis(1));
            fs::create_dir_all(&config.repository_path).unwrap();
            Self {
                _temp: temp,
                config,
                progress: Arc::new(CollectingHandler::new()),
            }
        }

        fn orchestrator(&self, repository: FakeRepository, runner: Arc<dyn BuildRunner>) -> DeploymentOrchestrator {
            DeploymentOrchestrator::new(self.config.clone(), Arc::new(repository))
                .with_settings(DeploymentSettings::new())
                .with_runner(runner)
                .with_progress(self.progress.clone())
        }

        fn trigger(&self) -> DeploymentTrigger {
            DeploymentTrigger::new("https://example.com/site.git", "main").with_deployer("GitHub")
        }
    }

    #[tokio::test]
    async fn test_successful_cycle_records_and_syncs() {
        let site = Site::new();
        let runner = Arc::new(ScriptedRunner::new());
        let orchestrator = site.orchestrator(FakeRepository::new(&site.config.repository_path), runner);

        let outcome = orchestrator.deploy(&site.trigger()).await.unwrap();
        assert_eq!(
            outcome,
            DeploymentOutcome::Deployed {
                id: "commit1".to_string(),
                cycles: 1
            }
        );
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);

        let deployments = &site.config.deployments_path;
        let saved = DeploymentRecord::load(deployments, "commit1").unwrap();
        assert_eq!(saved.status, DeploymentStatus::Success);
        assert_eq!(saved.deployer, "GitHub");
        assert_eq!(saved.author.as_deref(), Some("Dev <dev@example.com>"));
        assert_eq!(saved.builder.as_deref(), Some(BuilderKind::Basic.name()));
        assert_eq!(record::read_active(deployments).unwrap().as_deref(), Some("commit1"));
        assert_eq!(
            fs::read_to_string(DeploymentRecord::manifest_path(deployments, "commit1")).unwrap(),
            "index.html\n"
        );
        assert!(!DeploymentLock::is_held(deployments));
    }

    #[tokio::test]
    async fn test_busy_lock_queues_pending() {
        let site = Site::new();
        let runner = Arc::new(ScriptedRunner::new());
        let orchestrator = site.orchestrator(FakeRepository::new(&site.config.repository_path), runner.clone());

        let _held = DeploymentLock::try_acquire(&site.config.deployments_path, "someone else").unwrap();
        let outcome = orchestrator.deploy(&site.trigger()).await.unwrap();

        assert_eq!(outcome, DeploymentOutcome::Queued);
        assert_eq!(outcome.exit_code(), EXIT_CONFLICT);
        assert!(PendingMarker::new(&site.config.deployments_path).is_set());
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
        assert_eq!(
            site.progress
                .count(|e| matches!(e, ProgressEvent::PendingQueued { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_cycle_still_drains_pending() {
        let site = Site::new();
        let mut runner = ScriptedRunner::new();
        runner.fail_on = vec![1];
        runner.queue_on = vec![1];
        let runner = Arc::new(runner);
        let orchestrator = site.orchestrator(FakeRepository::new(&site.config.repository_path), runner.clone());

        let outcome = orchestrator
            .deploy(&site.trigger().with_commit("pinned"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DeploymentOutcome::Deployed {
                id: "commit2".to_string(),
                cycles: 2
            }
        );
        // The drained cycle follows the branch head, not the pinned commit
        assert_eq!(
            *runner.seen.lock().unwrap(),
            vec![Some("pinned".to_string()), Some("commit2".to_string())]
        );
        let deployments = &site.config.deployments_path;
        let failed = DeploymentRecord::load(deployments, "pinned").unwrap();
        assert_eq!(failed.status, DeploymentStatus::Failed);
        assert!(failed.error.unwrap().contains("build 1 broke"));
        assert_eq!(record::read_active(deployments).unwrap().as_deref(), Some("commit2"));
        assert!(!PendingMarker::new(deployments).is_set());
        assert_eq!(site.progress.count(|e| *e == ProgressEvent::PendingDrained), 1);
    }

    #[tokio::test]
    async fn test_previous_manifest_is_passed_to_next_cycle() {
        let site = Site::new();
        let runner = Arc::new(ScriptedRunner::new());
        let orchestrator = site.orchestrator(FakeRepository::new(&site.config.repository_path), runner);
        orchestrator.deploy(&site.trigger()).await.unwrap();

        struct ManifestProbe(Mutex<Option<Option<PathBuf>>>);

        #[async_trait]
        impl BuildRunner for ManifestProbe {
            async fn build(&self, ctx: &BuildContext) -> Result<BuilderSelection, DeployError> {
                *self.0.lock().unwrap() = Some(ctx.previous_manifest.clone());
                Ok(BuilderSelection::new(BuilderKind::Basic, &ctx.repository_path, &ctx.repository_path))
            }
        }

        let probe = Arc::new(ManifestProbe(Mutex::new(None)));
        let orchestrator = site.orchestrator(FakeRepository::new(&site.config.repository_path), probe.clone());
        orchestrator.deploy(&site.trigger().with_commit("second")).await.unwrap();

        assert_eq!(
            probe.0.lock().unwrap().clone(),
            Some(Some(DeploymentRecord::manifest_path(
                &site.config.deployments_path,
                "commit1"
            )))
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_recorded() {
        let site = Site::new();
        let mut repository = FakeRepository::new(&site.config.repository_path);
        repository.fail_fetch = Some("fatal: repository not found");
        let orchestrator = site.orchestrator(repository, Arc::new(ScriptedRunner::new()));

        let err = orchestrator.deploy(&site.trigger()).await.unwrap_err();
        assert!(matches!(err, DeployError::Fetch(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(!DeploymentLock::is_held(&site.config.deployments_path));
        assert_eq!(
            site.progress
                .count(|e| matches!(e, ProgressEvent::FetchAttempt { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_project_is_resolution_fatal() {
        let site = Site::new();
        let orchestrator = DeploymentOrchestrator::new(
            site.config.clone(),
            Arc::new(FakeRepository::new(&site.config.repository_path)),
        )
        .with_settings(DeploymentSettings::new().with_value(keys::PROJECT, "missing/App.csproj"))
        .with_runner(Arc::new(SiteBuildRunner::new().with_host(HostSignals::default())))
        .with_progress(site.progress.clone());

        let err = orchestrator.deploy(&site.trigger()).await.unwrap_err();
        assert!(err.is_resolution_fatal());
        assert_eq!(err.exit_code(), 3);

        let saved = DeploymentRecord::load(&site.config.deployments_path, "commit1").unwrap();
        assert_eq!(saved.status, DeploymentStatus::Failed);
        assert!(record::read_active(&site.config.deployments_path).unwrap().is_none());
    }

    /// Stands in for a holder that finishes right after the queue attempt
    struct ReleaseOnQueue {
        held: Mutex<Option<DeploymentLock>>,
        events: CollectingHandler,
    }

    impl ProgressHandler for ReleaseOnQueue {
        fn on_progress(&self, event: &ProgressEvent) {
            if matches!(event, ProgressEvent::PendingQueued { .. }) {
                self.held.lock().unwrap().take();
            }
            self.events.on_progress(event);
        }
    }

    #[tokio::test]
    async fn test_marker_set_after_holder_left_is_drained_by_queuer() {
        let site = Site::new();
        let deployments = &site.config.deployments_path;
        let held = DeploymentLock::try_acquire(deployments, "finishing holder").unwrap();
        let progress = Arc::new(ReleaseOnQueue {
            held: Mutex::new(Some(held)),
            events: CollectingHandler::new(),
        });
        let runner = Arc::new(ScriptedRunner::new());
        let orchestrator = site
            .orchestrator(FakeRepository::new(&site.config.repository_path), runner.clone())
            .with_progress(progress.clone());

        let outcome = orchestrator.deploy(&site.trigger()).await.unwrap();

        assert_eq!(
            outcome,
            DeploymentOutcome::Deployed {
                id: "commit1".to_string(),
                cycles: 1
            }
        );
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
        assert!(!PendingMarker::new(deployments).is_set());
        assert!(!DeploymentLock::is_held(deployments));
        assert_eq!(
            progress
                .events
                .count(|e| matches!(e, ProgressEvent::PendingQueued { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_unwritable_target_is_reported_as_io() {
        let site = Site::new();
        fs::create_dir_all(site.config.target_path.parent().unwrap()).unwrap();
        fs::write(&site.config.target_path, "not a directory").unwrap();
        let orchestrator = site.orchestrator(
            FakeRepository::new(&site.config.repository_path),
            Arc::new(ScriptedRunner::new()),
        );

        let err = orchestrator.deploy(&site.trigger()).await.unwrap_err();
        match &err {
            DeployError::Io { path, .. } => assert_eq!(path, &site.config.target_path),
            other => panic!("Expected an I/O error, got {:?}", other),
        }
        let saved = DeploymentRecord::load(&site.config.deployments_path, "commit1").unwrap();
        assert_eq!(saved.status, DeploymentStatus::Failed);
    }
}
