use siteforge::cli::commands::{CliArgs, Commands};
use siteforge::cli::handlers::{handle_deploy, handle_detect, handle_resolve};
use siteforge::util::logging::{config_from_env, init_logging, parse_level};
use siteforge::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("siteforge v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Detect(detect_args) => handle_detect(detect_args),
        Commands::Resolve(resolve_args) => handle_resolve(resolve_args),
        Commands::Deploy(deploy_args) => handle_deploy(deploy_args).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = config_from_env();

    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }
    config.use_json |= args.log_json;

    init_logging(config);
}
