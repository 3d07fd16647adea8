use crate::config::ConfigError;
use crate::exec::ExecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Missing console worker template {path}")]
    Template {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid deployment setting: {0}")]
    Config(#[from] ConfigError),

    #[error("Builder {kind} needs a command but none was configured")]
    MissingCommand { kind: String },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}
