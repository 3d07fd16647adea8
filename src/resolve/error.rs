use std::path::PathBuf;
use thiserror::Error;

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fatal outcomes of builder resolution
///
/// Inconclusive detection is not an error; it falls through to the basic
/// builder. These variants are the cases where guessing would deploy the
/// wrong thing.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "Unable to determine which solution file to build ({}). Set PROJECT to the project to deploy",
        join_paths(.paths)
    )]
    AmbiguousSolutions { paths: Vec<PathBuf> },

    #[error(
        "Unable to determine which project file to build ({}). Set PROJECT to the project to deploy",
        join_paths(.paths)
    )]
    AmbiguousProjects { paths: Vec<PathBuf> },

    #[error("Project or directory {path} does not exist")]
    ProjectNotFound { path: PathBuf },

    #[error("Project {path} is not deployable: only web, ASP.NET Core, function and console projects are supported")]
    ProjectNotDeployable { path: PathBuf },

    #[error("Failed to parse solution {path}: {message}")]
    SolutionParse { path: PathBuf, message: String },

    #[error("Failed to read project {path}: {message}")]
    ProjectParse { path: PathBuf, message: String },

    #[error("Failed to list files under {path}: {message}")]
    Listing { path: PathBuf, message: String },
}

impl ResolveError {
    /// Paths the caller should show the user
    pub fn paths(&self) -> Vec<&PathBuf> {
        match self {
            ResolveError::AmbiguousSolutions { paths } | ResolveError::AmbiguousProjects { paths } => {
                paths.iter().collect()
            }
            ResolveError::ProjectNotFound { path }
            | ResolveError::ProjectNotDeployable { path }
            | ResolveError::SolutionParse { path, .. }
            | ResolveError::ProjectParse { path, .. }
            | ResolveError::Listing { path, .. } => vec![path],
        }
    }
}
