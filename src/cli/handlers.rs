use super::commands::{DeployArgs, DetectArgs, ResolveArgs};
use super::output::{DetectReport, OutputFormat, OutputFormatter};
use crate::config::{keys, DeploymentSettings, EngineConfig, Platform};
use crate::deploy::{
    DeployError, DeploymentOrchestrator, DeploymentOutcome, DeploymentTrigger, GitRepository, EXIT_FAILURE,
    EXIT_RESOLUTION, EXIT_SUCCESS,
};
use crate::detect::{DetectContext, DetectorRegistry, HostSignals};
use crate::fs::RealFileSystem;
use crate::resolve::{BuilderResolver, ResolveRequest};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

fn repository_root(path: Option<&PathBuf>) -> PathBuf {
    let path = path.cloned().unwrap_or_else(|| PathBuf::from("."));
    path.canonicalize().unwrap_or(path)
}

fn emit(output: anyhow::Result<String>) -> i32 {
    match output {
        Ok(text) => {
            println!("{}", text.trim_end());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    }
}

pub fn handle_detect(args: &DetectArgs) -> i32 {
    let directory = repository_root(args.repository_path.as_ref());
    if !directory.is_dir() {
        eprintln!("Error: {} is not a directory", directory.display());
        return EXIT_FAILURE;
    }

    let platform = args.platform.map(Platform::from).unwrap_or_else(Platform::current);
    let host = HostSignals::from_env();
    let fs = RealFileSystem;
    let ctx = DetectContext::new(&fs, platform, &host);
    let registry = DetectorRegistry::with_defaults();

    let report = DetectReport {
        selected: registry.first_match(&ctx, &directory),
        signatures: registry.evaluate_all(&ctx, &directory),
        directory,
        platform,
    };
    debug!(selected = ?report.selected, "Detection finished");

    emit(OutputFormatter::new(OutputFormat::from(args.format)).format_detect(&report))
}

pub fn handle_resolve(args: &ResolveArgs) -> i32 {
    let repository = repository_root(args.repository_path.as_ref());
    let formatter = OutputFormatter::new(OutputFormat::from(args.format));

    let mut settings = DeploymentSettings::from_env().overlay_deployment_file(&repository);
    if let Some(project) = &args.project {
        settings = settings.with_value(keys::PROJECT, project.as_str());
    }

    let host = if args.function_app {
        HostSignals::function_app()
    } else {
        HostSignals::from_env()
    };
    let mut request = ResolveRequest::new(&repository, settings)
        .with_platform(args.platform.map(Platform::from).unwrap_or_else(Platform::current))
        .with_host(host);
    if let Some(deployer) = &args.deployer {
        request = request.with_deployer(deployer.as_str());
    }

    match BuilderResolver::new().resolve(&RealFileSystem, &request) {
        Ok(selection) => emit(formatter.format_selection(&selection)),
        Err(e) => {
            match formatter.format_resolve_error(&e) {
                Ok(text) => eprintln!("{}", text.trim_end()),
                Err(_) => eprintln!("Error: {}", e),
            }
            EXIT_RESOLUTION
        }
    }
}

pub async fn handle_deploy(args: &DeployArgs) -> i32 {
    match deploy(args).await {
        Ok(outcome) => {
            match &outcome {
                DeploymentOutcome::Deployed { id, cycles } => {
                    info!(id = %id, cycles, "Deployment finished");
                    println!("Deployed {}", id);
                }
                DeploymentOutcome::Queued => {
                    println!("Another deployment is running; this one was queued");
                }
            }
            outcome.exit_code()
        }
        Err(e) => {
            error!(error = %e, "Deployment failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn deploy(args: &DeployArgs) -> Result<DeploymentOutcome, DeployError> {
    let config = match &args.site_root {
        Some(root) => EngineConfig::rooted_at(Path::new(root)),
        None => EngineConfig::default(),
    };
    config.validate()?;

    let settings = DeploymentSettings::from_env();
    let branch = args
        .branch
        .clone()
        .unwrap_or_else(|| settings.target_branch().to_string());

    let repository = GitRepository::new(&config.repository_path).with_idle_timeout(settings.command_idle_timeout()?);

    let mut trigger = DeploymentTrigger::new(args.repo_url.as_str(), branch).with_deployer(args.deployer.as_str());
    if let Some(commit) = &args.commit {
        trigger = trigger.with_commit(commit.as_str());
    }

    DeploymentOrchestrator::new(config, Arc::new(repository))
        .with_settings(settings)
        .deploy(&trigger)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::{OutputFormatArg, PlatformArg};
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn resolve_args(repository: &Path) -> ResolveArgs {
        ResolveArgs {
            repository_path: Some(repository.to_path_buf()),
            format: OutputFormatArg::Json,
            platform: Some(PlatformArg::Linux),
            project: None,
            function_app: false,
            deployer: None,
        }
    }

    #[test]
    #[serial]
    fn test_resolve_exit_codes() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<html>").unwrap();
        assert_eq!(handle_resolve(&resolve_args(temp.path())), EXIT_SUCCESS);

        let mut args = resolve_args(temp.path());
        args.project = Some("missing".to_string());
        assert_eq!(handle_resolve(&args), EXIT_RESOLUTION);
    }

    #[test]
    fn test_detect_rejects_missing_directory() {
        let temp = TempDir::new().unwrap();
        let args = DetectArgs {
            repository_path: Some(temp.path().join("nope")),
            format: OutputFormatArg::Human,
            platform: None,
        };
        assert_eq!(handle_detect(&args), EXIT_FAILURE);
    }
}
