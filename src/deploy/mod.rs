//! Deployment orchestration core
//!
//! Per-repository exclusive lock, pending-trigger coalescing, fetch with
//! retry, deployment records and the cycle that ties them to the builders.

mod error;
pub mod lock;
mod orchestrator;
pub mod pending;
pub mod record;
mod repository;
mod retry;
mod trigger;

pub use error::{DeployError, EXIT_CONFLICT, EXIT_FAILURE, EXIT_RESOLUTION, EXIT_SUCCESS};
pub use lock::{DeploymentLock, LockError, LockMetadata, LOCK_FILENAME};
pub use orchestrator::{BuildRunner, DeploymentOrchestrator, DeploymentOutcome, SiteBuildRunner};
pub use pending::{PendingMarker, PENDING_FILENAME};
pub use record::{DeploymentRecord, DeploymentStatus};
pub use repository::{ChangeSet, GitRepository, Repository, FETCH_HEAD};
pub use retry::{is_transient, RetryPolicy, TRANSIENT_FETCH_ERRORS};
pub use trigger::{DeploymentTrigger, DEFAULT_DEPLOYER};
