//! Progress handler trait and events

use std::sync::Mutex;
use std::time::Duration;

/// Which pipe of a child process a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Events emitted while a deployment runs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A deployment cycle took the lock and started
    DeploymentStarted { id: String, deployer: String },

    /// Fetch attempt `attempt` of `max_attempts` is starting
    FetchAttempt { attempt: u32, max_attempts: u32 },

    /// A transient fetch error will be retried after `delay`
    FetchRetry {
        attempt: u32,
        error: String,
        delay: Duration,
    },

    /// Resolution picked a builder
    BuilderSelected { kind: String, project_path: String },

    /// The cached deployment script matched and is reused
    ScriptCacheHit { command_line: String },

    /// The deployment script must be regenerated
    ScriptCacheMiss { reason: String },

    /// A command is about to run
    CommandStarted { command: String },

    /// One line of child process output
    OutputLine { stream: OutputStream, line: String },

    /// The builder failed
    BuildFailed { error: String },

    /// Top-level error entry written after the live output already captured the failure
    GlobalError,

    /// A trigger arrived while another deployment held the lock
    PendingQueued { repository: String },

    /// A queued trigger is being drained into another cycle
    PendingDrained,

    /// Deployment cycle finished successfully
    DeploymentCompleted { id: String, duration: Duration },

    /// Deployment cycle failed
    DeploymentFailed { id: String, error: String },
}

/// Trait for handling progress events during a deployment
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Records every event, in order
#[derive(Debug, Default)]
pub struct CollectingHandler {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Output lines only, in arrival order
    pub fn output_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::OutputLine { line, .. } => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl ProgressHandler for CollectingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
