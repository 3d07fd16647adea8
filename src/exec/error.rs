use std::io;
use std::time::Duration;
use thiserror::Error;

/// Captured result of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(
        "Command {program} was aborted because it produced no output for {} seconds",
        .timeout.as_secs()
    )]
    IdleTimeout { program: String, timeout: Duration },

    #[error("Command {program} exited with code {code}")]
    NonZeroExit {
        program: String,
        code: i32,
        output: CommandOutput,
    },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    /// Combined output of a failed command, if it ran to completion
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            ExecError::NonZeroExit { output, .. } => Some(output),
            _ => None,
        }
    }
}
