//! External command execution
//!
//! Everything the engine runs (script generator, generated scripts, custom
//! commands, git) goes through [`Executable`], which enforces the idle
//! timeout and streams output to the deployment progress log.

mod environment;
mod error;
mod executable;

pub use environment::{build_environment, vars, DeploymentVariables, EnvironmentBlock, ToolPaths};
pub use error::{CommandOutput, ExecError};
pub use executable::{platform_shell, Executable};
