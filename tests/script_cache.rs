//! Deployment script reuse across builds
#![cfg(unix)]

use siteforge::builder::{DeploymentScriptCache, CACHE_KEY_FILE};
use siteforge::config::keys;
use siteforge::fs::RealFileSystem;
use siteforge::progress::{CollectingHandler, ProgressEvent, ProgressHandler};
use siteforge::{
    BuildContext, BuilderKind, BuilderResolver, DeploymentSettings, EngineConfig, HostSignals, Platform,
    ResolveRequest, SiteBuilder,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Generator that numbers each generation, so a reused script is recognizable
const FAKE_GENERATOR: &str = r#"#!/bin/sh
dir=$(dirname "$0")
if [ "$1" = "--version" ]; then cat "$dir/generator-version"; exit 0; fi
echo run >> "$dir/generations"
n=$(wc -l < "$dir/generations" | tr -d ' ')
while [ $# -gt 0 ]; do if [ "$1" = "-o" ]; then out="$2"; fi; shift; done
printf '#!/bin/sh\necho generation %s\n' "$n" > "$out/deploy.sh"
"#;

struct Site {
    _temp: TempDir,
    config: EngineConfig,
    tools: PathBuf,
}

impl Site {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let tools = temp.path().join("tools");
        fs::create_dir_all(&tools).unwrap();
        let generator = tools.join("kuduscript");
        fs::write(&generator, FAKE_GENERATOR).unwrap();
        fs::set_permissions(&generator, fs::Permissions::from_mode(0o755)).unwrap();

        let config = EngineConfig::rooted_at(temp.path())
            .with_platform(Platform::Linux)
            .with_script_generator(&generator);
        fs::create_dir_all(&config.repository_path).unwrap();
        fs::create_dir_all(&config.temp_path).unwrap();
        fs::write(config.repository_path.join("package.json"), "{}").unwrap();

        let site = Self {
            _temp: temp,
            config,
            tools,
        };
        site.set_version("1.0.17");
        site
    }

    fn set_version(&self, version: &str) {
        fs::write(self.tools.join("generator-version"), format!("{}\n", version)).unwrap();
    }

    fn generations(&self) -> usize {
        fs::read_to_string(self.tools.join("generations"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    fn script(&self) -> String {
        fs::read_to_string(self.config.deployments_path.join("deploy.sh")).unwrap()
    }

    async fn build(&self, settings: DeploymentSettings) -> Arc<CollectingHandler> {
        let request = ResolveRequest::new(&self.config.repository_path, settings.clone())
            .with_platform(Platform::Linux)
            .with_host(HostSignals::default());
        let selection = BuilderResolver::new().resolve(&RealFileSystem, &request).unwrap();

        let progress = Arc::new(CollectingHandler::new());
        let handler: Arc<dyn ProgressHandler> = progress.clone();
        let ctx = BuildContext::from_config(&self.config, settings).with_progress(handler);
        SiteBuilder::new(selection).build(&ctx).await.unwrap();
        progress
    }
}

#[tokio::test]
async fn test_identical_inputs_reuse_script_verbatim() {
    let site = Site::new();

    let first = site.build(DeploymentSettings::new()).await;
    let script = site.script();
    let second = site.build(DeploymentSettings::new()).await;

    assert_eq!(site.generations(), 1);
    assert_eq!(site.script(), script);
    assert_eq!(first.output_lines(), vec!["generation 1"]);
    assert_eq!(second.output_lines(), vec!["generation 1"]);
    assert_eq!(
        second.count(|e| matches!(e, ProgressEvent::ScriptCacheHit { .. })),
        1
    );
}

#[tokio::test]
async fn test_version_change_regenerates() {
    let site = Site::new();
    site.build(DeploymentSettings::new()).await;

    site.set_version("1.0.18");
    let progress = site.build(DeploymentSettings::new()).await;

    assert_eq!(site.generations(), 2);
    assert_eq!(progress.output_lines(), vec!["generation 2"]);
    assert!(progress.events().contains(&ProgressEvent::ScriptCacheMiss {
        reason: "script generator version changed".to_string()
    }));
}

#[tokio::test]
async fn test_argument_change_regenerates() {
    let site = Site::new();
    site.build(DeploymentSettings::new()).await;

    let settings = DeploymentSettings::new().with_value(keys::SCRIPT_GENERATOR_ARGS, "--basic --sitePath \".\"");
    let progress = site.build(settings).await;

    assert_eq!(site.generations(), 2);
    assert!(progress.events().contains(&ProgressEvent::ScriptCacheMiss {
        reason: "generator arguments changed".to_string()
    }));
}

#[tokio::test]
async fn test_missing_key_file_regenerates() {
    let site = Site::new();
    site.build(DeploymentSettings::new()).await;
    fs::remove_file(site.config.deployments_path.join(CACHE_KEY_FILE)).unwrap();

    site.build(DeploymentSettings::new()).await;
    assert_eq!(site.generations(), 2);

    let cache = DeploymentScriptCache::new(&site.config.deployments_path, Platform::Linux);
    let key = fs::read_to_string(cache.key_path()).unwrap();
    let lines: Vec<&str> = key.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "1.0.17");
    assert!(lines[1].contains("--node --sitePath"));
    assert_eq!(
        BuilderKind::Node,
        BuilderResolver::new()
            .resolve(
                &RealFileSystem,
                &ResolveRequest::new(&site.config.repository_path, DeploymentSettings::new())
                    .with_platform(Platform::Linux)
                    .with_host(HostSignals::default())
            )
            .unwrap()
            .kind()
    );
}
