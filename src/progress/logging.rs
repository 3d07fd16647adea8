//! Logging-based progress handler

use super::{OutputStream, ProgressEvent, ProgressHandler};
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::DeploymentStarted { id, deployer } => {
                info!(id = %id, deployer = %deployer, "Deployment started");
            }
            ProgressEvent::FetchAttempt {
                attempt,
                max_attempts,
            } => {
                debug!(attempt, max_attempts, "Fetching changes");
            }
            ProgressEvent::FetchRetry {
                attempt,
                error,
                delay,
            } => {
                warn!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis(),
                    "Transient fetch error, retrying"
                );
            }
            ProgressEvent::BuilderSelected { kind, project_path } => {
                info!(builder = %kind, project = %project_path, "Builder selected");
            }
            ProgressEvent::ScriptCacheHit { command_line } => {
                info!(command = %command_line, "Using cached deployment script");
            }
            ProgressEvent::ScriptCacheMiss { reason } => {
                info!(reason = %reason, "Generating deployment script");
            }
            ProgressEvent::CommandStarted { command } => {
                info!(command = %command, "Running deployment command");
            }
            ProgressEvent::OutputLine { stream, line } => match stream {
                OutputStream::Stdout => info!(target: "siteforge::output", "{}", line),
                OutputStream::Stderr => warn!(target: "siteforge::output", "{}", line),
            },
            ProgressEvent::BuildFailed { error } => {
                error!(error = %error, "Build failed");
            }
            ProgressEvent::GlobalError => {
                error!("Deployment failed, see the deployment log above");
            }
            ProgressEvent::PendingQueued { repository } => {
                info!(
                    repository = %repository,
                    "Deployment in progress, queued a pending deployment"
                );
            }
            ProgressEvent::PendingDrained => {
                info!("Running queued deployment");
            }
            ProgressEvent::DeploymentCompleted { id, duration } => {
                info!(id = %id, duration_ms = duration.as_millis(), "Deployment successful");
            }
            ProgressEvent::DeploymentFailed { id, error } => {
                error!(id = %id, error = %error, "Deployment failed");
            }
        }
    }
}
