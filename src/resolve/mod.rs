//! Builder resolution: from a repository tree and its settings to exactly
//! one builder, or a fatal error when choosing would be a guess.

mod engine;
mod error;
mod selection;

pub use engine::{BuilderResolver, ResolveRequest, ONE_DEPLOY_DEPLOYER};
pub use error::ResolveError;
pub use selection::{BuilderKind, BuilderSelection};
