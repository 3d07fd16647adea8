//! Function App signal
//!
//! Unlike the other signatures this one is not read from the tree: the
//! hosting runtime advertises itself through an environment variable.

use super::{DetectContext, Signature, SignatureDetector};
use std::env;
use std::path::Path;

/// Set by the Functions host on every worker it runs
pub const FUNCTIONS_RUNTIME_VAR: &str = "FUNCTIONS_EXTENSION_VERSION";

/// Signals read from the hosting environment rather than the repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostSignals {
    pub function_app_runtime: bool,
}

impl HostSignals {
    pub fn from_env() -> Self {
        Self {
            function_app_runtime: env::var(FUNCTIONS_RUNTIME_VAR)
                .is_ok_and(|v| !v.trim().is_empty()),
        }
    }

    pub fn function_app() -> Self {
        Self {
            function_app_runtime: true,
        }
    }
}

pub struct FunctionAppDetector;

impl SignatureDetector for FunctionAppDetector {
    fn signature(&self) -> Signature {
        Signature::FunctionApp
    }

    fn detect(&self, ctx: &DetectContext<'_>, _dir: &Path) -> bool {
        ctx.host.function_app_runtime
    }
}
