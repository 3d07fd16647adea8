//! Console worker preparation
//!
//! A console worker deploys as a small host site plus the worker binaries.
//! Before generation the host site templates are copied into the build temp
//! directory and a start script that runs the worker command is written to
//! `bin/`.

use super::{BuildContext, BuildError};
use crate::config::Platform;
use crate::resolve::BuilderSelection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const WORKER_TEMPLATES: &[&str] = &["global.asax", "web.config"];

pub(super) fn prepare_worker(
    selection: &BuilderSelection,
    ctx: &BuildContext,
    build_temp: &Path,
) -> Result<PathBuf, BuildError> {
    for name in WORKER_TEMPLATES {
        let template = ctx.templates_path.join(format!("{}.template", name));
        let destination = build_temp.join(name);
        fs::copy(&template, &destination).map_err(|source| BuildError::Template {
            path: template.clone(),
            source,
        })?;
    }

    let command = worker_command(selection, ctx);
    let bin = build_temp.join("bin");
    fs::create_dir_all(&bin).map_err(|e| BuildError::io(&bin, e))?;

    let (name, content) = match ctx.platform {
        Platform::Windows => ("run_worker.cmd", format!("@echo off\n{}\n", command)),
        Platform::Linux | Platform::Other => ("run_worker.sh", format!("#!/bin/sh\n{}\n", command)),
    };
    let script = bin.join(name);
    fs::write(&script, content).map_err(|e| BuildError::io(&script, e))?;
    debug!(script = %script.display(), command = %command, "Wrote worker start script");
    Ok(script)
}

/// Configured worker command, else the project's own output
fn worker_command(selection: &BuilderSelection, ctx: &BuildContext) -> String {
    if let Some(command) = ctx.settings.worker_command() {
        return command.to_string();
    }
    let stem = selection
        .project_path()
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match ctx.platform {
        Platform::Windows => format!("{}.exe", stem),
        Platform::Linux | Platform::Other => format!("dotnet {}.dll", stem),
    }
}
