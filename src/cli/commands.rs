use crate::config::Platform;
use crate::deploy::DEFAULT_DEPLOYER;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Source-to-deployment engine: detects what a repository is and builds it
#[derive(Parser, Debug)]
#[command(
    name = "siteforge",
    about = "Detect, resolve and deploy web site repositories",
    version,
    author,
    long_about = "siteforge inspects a repository to decide how it should be built \
                  (solutions, projects, language signatures, deployment settings), \
                  then runs the matching builder under a per-repository deployment lock."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Verbose output (debug logging)")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Show which project signatures match a directory",
        long_about = "Runs every signature detector against a directory and prints \
                      which ones match, in priority order.\n\n\
                      Examples:\n  \
                      siteforge detect\n  \
                      siteforge detect /home/site/repository --platform windows"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Resolve the builder for a repository",
        long_about = "Applies deployment settings, solution and project discovery and \
                      signature detection to pick the builder a deployment would use.\n\n\
                      Examples:\n  \
                      siteforge resolve\n  \
                      siteforge resolve /path/to/repo --format json\n  \
                      siteforge resolve --project src/Web/Web.csproj"
    )]
    Resolve(ResolveArgs),

    #[command(
        about = "Fetch and deploy a branch",
        long_about = "Fetches the branch into the configured repository directory and \
                      runs a full deployment cycle. When another deployment is running \
                      the request is queued and the command exits with code 2.\n\n\
                      Examples:\n  \
                      siteforge deploy --repo-url https://example.com/site.git --branch main\n  \
                      siteforge deploy --repo-url ../site --branch main --commit 4f2a9c1"
    )]
    Deploy(DeployArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    #[arg(value_name = "PATH", help = "Directory to inspect (defaults to current directory)")]
    pub repository_path: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,

    #[arg(long, value_enum, help = "Host platform (defaults to the current one)")]
    pub platform: Option<PlatformArg>,
}

#[derive(Parser, Debug, Clone)]
pub struct ResolveArgs {
    #[arg(value_name = "PATH", help = "Repository root (defaults to current directory)")]
    pub repository_path: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,

    #[arg(long, value_enum, help = "Host platform (defaults to the current one)")]
    pub platform: Option<PlatformArg>,

    #[arg(
        short = 'p',
        long,
        value_name = "PATH",
        help = "Project or directory to deploy, relative to the repository (overrides PROJECT)"
    )]
    pub project: Option<String>,

    #[arg(long, help = "Resolve as if running on a Functions host")]
    pub function_app: bool,

    #[arg(long, value_name = "LABEL", help = "Deployer label passed to resolution")]
    pub deployer: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct DeployArgs {
    #[arg(long, value_name = "URL", help = "Repository to fetch from")]
    pub repo_url: String,

    #[arg(
        short = 'b',
        long,
        value_name = "BRANCH",
        help = "Branch to deploy (defaults to the deployment_branch setting)"
    )]
    pub branch: Option<String>,

    #[arg(short = 'c', long, value_name = "COMMIT", help = "Commit to deploy instead of the branch head")]
    pub commit: Option<String>,

    #[arg(long, value_name = "LABEL", default_value = DEFAULT_DEPLOYER, help = "Who triggered the deployment")]
    pub deployer: String,

    #[arg(
        long,
        value_name = "DIR",
        help = "Site root; repository, deployments, target and temp live under it"
    )]
    pub site_root: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformArg {
    Linux,
    Windows,
    Other,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Linux => Platform::Linux,
            PlatformArg::Windows => Platform::Windows,
            PlatformArg::Other => Platform::Other,
        }
    }
}
