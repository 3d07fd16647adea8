//! Generator-family builds
//!
//! Run the script generator (unless the cached script still matches), then
//! run the generated deployment script.

use super::kind::{generator_command_line, generator_flags};
use super::script_cache::{CacheLookup, DeploymentScriptCache};
use super::{BuildContext, BuildError};
use crate::config::Platform;
use crate::exec::{platform_shell, EnvironmentBlock, Executable};
use crate::progress::ProgressEvent;
use crate::resolve::BuilderSelection;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub(super) async fn build(
    selection: &BuilderSelection,
    ctx: &BuildContext,
    build_temp: &Path,
) -> Result<(), BuildError> {
    let flags = generator_flags(selection).unwrap_or_default();
    let command_line = generator_command_line(
        &ctx.script_generator,
        selection.repository_path(),
        &ctx.deployments_path,
        &flags,
    );
    let idle_timeout = ctx.idle_timeout()?;
    let environment = ctx.environment(build_temp);

    fs::create_dir_all(&ctx.deployments_path).map_err(|e| BuildError::io(&ctx.deployments_path, e))?;

    let cache = DeploymentScriptCache::new(&ctx.deployments_path, ctx.platform);
    let version = generator_version(ctx, &environment, idle_timeout).await;

    let reused = match version.as_deref() {
        Some(version) => match cache.lookup(version, &command_line) {
            CacheLookup::Hit => true,
            CacheLookup::Miss(reason) => {
                ctx.progress().on_progress(&ProgressEvent::ScriptCacheMiss {
                    reason: reason.describe().to_string(),
                });
                false
            }
        },
        None => {
            ctx.progress().on_progress(&ProgressEvent::ScriptCacheMiss {
                reason: "script generator version unavailable".to_string(),
            });
            false
        }
    };

    if reused {
        ctx.progress().on_progress(&ProgressEvent::ScriptCacheHit {
            command_line: command_line.clone(),
        });
    } else {
        cache.invalidate();
        run_shell(ctx, &command_line, selection.repository_path(), &environment, idle_timeout).await?;
        if let Some(version) = version.as_deref() {
            cache.store(version, &command_line);
        }
    }

    run_script(ctx, &cache.script_path(), selection.repository_path(), &environment, idle_timeout).await
}

/// Trimmed output of `<generator> --version`, `None` when unavailable
async fn generator_version(
    ctx: &BuildContext,
    environment: &EnvironmentBlock,
    idle_timeout: Duration,
) -> Option<String> {
    let result = Executable::new(&ctx.script_generator, &ctx.repository_path, idle_timeout)
        .with_environment(environment.clone())
        .execute(["--version"])
        .await;

    match result {
        Ok(output) => Some(output.stdout.trim().to_string()).filter(|v| !v.is_empty()),
        Err(e) => {
            warn!(generator = %ctx.script_generator.display(), error = %e, "Could not read script generator version");
            None
        }
    }
}

/// Runs a command line through the platform shell, streaming output
pub(super) async fn run_shell(
    ctx: &BuildContext,
    command_line: &str,
    working_dir: &Path,
    environment: &EnvironmentBlock,
    idle_timeout: Duration,
) -> Result<(), BuildError> {
    ctx.progress().on_progress(&ProgressEvent::CommandStarted {
        command: command_line.to_string(),
    });

    let (shell, flag) = platform_shell(ctx.platform);
    Executable::new(shell, working_dir, idle_timeout)
        .with_environment(environment.clone())
        .execute_streaming([flag, command_line], ctx.progress())
        .await?;
    Ok(())
}

async fn run_script(
    ctx: &BuildContext,
    script: &Path,
    working_dir: &Path,
    environment: &EnvironmentBlock,
    idle_timeout: Duration,
) -> Result<(), BuildError> {
    let script_text = script.display().to_string();
    ctx.progress().on_progress(&ProgressEvent::CommandStarted {
        command: script_text.clone(),
    });

    let (shell, flag) = platform_shell(ctx.platform);
    let args: Vec<&str> = match ctx.platform {
        Platform::Windows => vec![flag, script_text.as_str()],
        Platform::Linux | Platform::Other => vec![script_text.as_str()],
    };

    Executable::new(shell, working_dir, idle_timeout)
        .with_environment(environment.clone())
        .execute_streaming(args, ctx.progress())
        .await?;
    Ok(())
}

/// Deletes a `web.config` the Node script generated, unless it is under source control
pub(super) async fn remove_untracked_web_config(selection: &BuilderSelection, ctx: &BuildContext) {
    let web_config = selection.project_path().join("web.config");
    if !web_config.is_file() {
        return;
    }
    let Some(repository) = &ctx.repository else {
        debug!("No repository to check web.config against, leaving it");
        return;
    };

    let relative = web_config
        .strip_prefix(repository.path())
        .unwrap_or(&web_config)
        .to_path_buf();

    match repository.is_tracked(&relative).await {
        Ok(true) => {}
        Ok(false) => match fs::remove_file(&web_config) {
            Ok(()) => info!(path = %web_config.display(), "Removed generated web.config"),
            Err(e) => warn!(path = %web_config.display(), error = %e, "Failed to remove generated web.config"),
        },
        Err(e) => warn!(error = %e, "Could not check whether web.config is tracked"),
    }
}
