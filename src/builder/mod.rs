//! Builders
//!
//! A [`SiteBuilder`] turns a [`BuilderSelection`] into a deployment. Most
//! kinds share one path: generate a deployment script with the external
//! generator, cache it, run it. The rest run a command or copy files
//! directly. See [`kind`] for the flag table.

mod console;
mod context;
mod direct;
mod error;
mod generator;
pub mod kind;
pub mod script_cache;

pub use context::BuildContext;
pub use error::BuildError;
pub use kind::BuilderFamily;
pub use script_cache::{CacheLookup, DeploymentScriptCache, MissReason, CACHE_KEY_FILE};

use crate::progress::ProgressEvent;
use crate::resolve::{BuilderKind, BuilderSelection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

pub struct SiteBuilder {
    selection: BuilderSelection,
}

impl SiteBuilder {
    pub fn new(selection: BuilderSelection) -> Self {
        Self { selection }
    }

    pub fn selection(&self) -> &BuilderSelection {
        &self.selection
    }

    pub fn project_type(&self) -> &'static str {
        self.selection.project_type()
    }

    /// Runs the build
    ///
    /// On failure a top-level error entry is written to the progress log
    /// after the live output, then the error is returned unchanged.
    pub async fn build(&self, ctx: &BuildContext) -> Result<(), BuildError> {
        info!(
            builder = %self.selection.kind(),
            project = %self.selection.project_path().display(),
            "Running build"
        );

        let result = self.run(ctx).await;
        if let Err(e) = &result {
            ctx.progress().on_progress(&ProgressEvent::BuildFailed { error: e.to_string() });
            ctx.progress().on_progress(&ProgressEvent::GlobalError);
        }
        result
    }

    async fn run(&self, ctx: &BuildContext) -> Result<(), BuildError> {
        let builder_kind = self.selection.kind();
        match builder_kind {
            BuilderKind::RunFromPackage => return direct::run_from_package(ctx),
            BuilderKind::OneDeploy => return direct::one_deploy(&self.selection, ctx),
            _ => {}
        }

        let build_temp = BuildTemp::create(&ctx.temp_root)?;
        match kind::family(builder_kind) {
            BuilderFamily::Direct => direct::custom_command(&self.selection, ctx, build_temp.path()).await,
            BuilderFamily::Generator => {
                if kind::needs_worker_template(builder_kind) {
                    console::prepare_worker(&self.selection, ctx, build_temp.path())?;
                }
                generator::build(&self.selection, ctx, build_temp.path()).await?;
                if builder_kind == BuilderKind::Node {
                    generator::remove_untracked_web_config(&self.selection, ctx).await;
                }
                Ok(())
            }
        }
    }
}

/// Fresh `<temp>/<uuid>` directory, removed when dropped
struct BuildTemp {
    path: PathBuf,
}

impl BuildTemp {
    fn create(root: &Path) -> Result<Self, BuildError> {
        let path = root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&path).map_err(|e| BuildError::io(&path, e))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildTemp {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to clean up build temp directory");
        }
    }
}
