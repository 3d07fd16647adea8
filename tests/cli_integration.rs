//! CLI integration tests
//!
//! Runs the built binary against temp repositories and checks output and
//! exit codes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn siteforge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_siteforge"))
        .args(args)
        .env_remove("PROJECT")
        .env_remove("COMMAND")
        .env_remove("SCM_SCRIPT_GENERATOR_ARGS")
        .env_remove("SCM_DO_BUILD_DURING_DEPLOYMENT")
        .env_remove("FUNCTIONS_EXTENSION_VERSION")
        .env("SITEFORGE_LOG_LEVEL", "error")
        .output()
        .expect("Failed to execute siteforge")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path is valid UTF-8")
}

#[test]
fn test_cli_help() {
    let output = siteforge(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("detect"));
    assert!(stdout.contains("resolve"));
    assert!(stdout.contains("deploy"));
}

#[test]
fn test_cli_version() {
    let output = siteforge(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_resolve_node_as_json() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("server.js"), "require('http')").unwrap();

    let output = siteforge(&["resolve", path_arg(temp.path()), "--format", "json", "--platform", "linux"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["kind"], "node");
}

#[test]
fn test_resolve_ambiguous_solutions_exit_code() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("A.sln"), "").unwrap();
    fs::write(temp.path().join("B.sln"), "").unwrap();

    let output = siteforge(&["resolve", path_arg(temp.path())]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("A.sln"));
    assert!(stderr.contains("B.sln"));
}

#[test]
fn test_resolve_project_flag() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("api")).unwrap();
    fs::write(temp.path().join("api").join("composer.lock"), "{}").unwrap();

    let output = siteforge(&[
        "resolve",
        path_arg(temp.path()),
        "--project",
        "api",
        "--platform",
        "linux",
        "--format",
        "yaml",
    ]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("kind: php"));
}

#[test]
fn test_detect_human_table() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("requirements.txt"), "flask").unwrap();
    fs::write(temp.path().join("app.py"), "import flask").unwrap();

    let output = siteforge(&["detect", path_arg(temp.path()), "--platform", "windows"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Selected:  Python"));
    assert!(stdout.contains("n/a"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let output = siteforge(&["frobnicate"]);
    assert!(!output.status.success());
}
