//! Builds that bypass script generation

use super::generator::run_shell;
use super::{BuildContext, BuildError};
use crate::fs::{FileSystem, RealFileSystem, SearchScope};
use crate::resolve::BuilderSelection;
use std::fs;
use std::path::Path;
use tracing::info;

/// Runs the user's deployment command through the platform shell
pub(super) async fn custom_command(
    selection: &BuilderSelection,
    ctx: &BuildContext,
    build_temp: &Path,
) -> Result<(), BuildError> {
    let command = selection.command().ok_or_else(|| BuildError::MissingCommand {
        kind: selection.kind().to_string(),
    })?;
    let idle_timeout = ctx.idle_timeout()?;
    let environment = ctx.environment(build_temp);
    run_shell(ctx, command, selection.repository_path(), &environment, idle_timeout).await
}

/// The package is mounted by the host; nothing to build
pub(super) fn run_from_package(ctx: &BuildContext) -> Result<(), BuildError> {
    info!(target_path = %ctx.target_path.display(), "Site runs from a package, skipping build");
    Ok(())
}

/// Copies the source tree into the target, carrying the manifest forward unchanged
pub(super) fn one_deploy(selection: &BuilderSelection, ctx: &BuildContext) -> Result<(), BuildError> {
    if let (Some(previous), Some(next)) = (&ctx.previous_manifest, &ctx.next_manifest) {
        if previous.is_file() {
            if let Some(parent) = next.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
            fs::copy(previous, next).map_err(|e| BuildError::io(previous, e))?;
        }
    }

    let copied = copy_tree(selection.project_path(), &ctx.target_path)?;
    info!(
        files = copied,
        target_path = %ctx.target_path.display(),
        "Incrementally deployed"
    );
    Ok(())
}

/// Recursive copy of every file under `source`, skipping `.git`
pub(crate) fn copy_tree(source: &Path, destination: &Path) -> Result<usize, BuildError> {
    let files = RealFileSystem
        .list_files(source, SearchScope::Recursive, &[".git"])
        .map_err(|e| BuildError::io(source, std::io::Error::other(e)))?;

    fs::create_dir_all(destination).map_err(|e| BuildError::io(destination, e))?;
    for file in &files {
        let Ok(relative) = file.strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::copy(file, &target).map_err(|e| BuildError::io(file, e))?;
    }
    Ok(files.len())
}
