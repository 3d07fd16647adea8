//! Visual Studio solution and project model
//!
//! Descriptors are built fresh for every resolution pass and never cached
//! across deployments.

pub mod guids;
mod project;
mod solution;

pub use project::{
    is_project_file, parse_project, parse_project_content, ProjectDescriptor, PROJECT_EXTENSIONS,
};
pub use solution::{
    parse_solution, parse_solution_content, SolutionDescriptor, SolutionProject,
};

pub(crate) use solution::same_path;
