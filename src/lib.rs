//! siteforge - source-to-deployment engine for web site repositories
//!
//! Given a repository pushed to a site, siteforge decides what kind of
//! project it is, picks the builder that knows how to deploy it and runs
//! that builder under a per-repository deployment lock.
//!
//! # Core Concepts
//!
//! - **Resolution**: deployment settings, solution and project discovery and
//!   language signatures narrow the repository down to one
//!   [`BuilderSelection`]. Ambiguity is an error, never a guess.
//! - **Builders**: most kinds ask an external script generator for a
//!   deployment script and cache it keyed by the generator's version and
//!   command line; the rest run a command or copy files directly.
//! - **Orchestration**: one deployment per repository at a time. Triggers
//!   that arrive while a deployment runs leave a pending marker, and the
//!   running deployment drains it into a single follow-up cycle.
//!
//! # Example Usage
//!
//! ```no_run
//! use siteforge::config::DeploymentSettings;
//! use siteforge::fs::RealFileSystem;
//! use siteforge::{BuilderResolver, ResolveRequest};
//!
//! let request = ResolveRequest::new("/home/site/repository", DeploymentSettings::from_env());
//! let selection = BuilderResolver::new().resolve(&RealFileSystem, &request)?;
//! println!("{} ({})", selection.kind(), selection.project_path().display());
//! # Ok::<(), siteforge::ResolveError>(())
//! ```
//!
//! # Project Structure
//!
//! - [`detect`]: project signature detectors
//! - [`vs`]: solution and project file parsing
//! - [`snapshot`]: per-resolution file listing cache
//! - [`resolve`]: the builder resolution engine
//! - [`builder`]: builder strategies and the deployment script cache
//! - [`deploy`]: lock, pending marker, fetch and the orchestration loop
//! - [`exec`]: child process execution with idle timeouts

pub mod builder;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod detect;
pub mod exec;
pub mod fs;
pub mod progress;
pub mod resolve;
pub mod snapshot;
pub mod util;
pub mod vs;

pub use builder::{BuildContext, BuildError, SiteBuilder};
pub use config::{ConfigError, DeploymentSettings, EngineConfig, Platform};
pub use deploy::{DeployError, DeploymentOrchestrator, DeploymentOutcome, DeploymentTrigger};
pub use detect::{HostSignals, Signature};
pub use exec::{ExecError, Executable};
pub use resolve::{BuilderKind, BuilderResolver, BuilderSelection, ResolveError, ResolveRequest};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_siteforge() {
        assert_eq!(NAME, "siteforge");
    }
}
