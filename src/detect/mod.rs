//! Project signature detection
//!
//! Each detector answers one yes/no question about a single directory
//! ("does this look like a Node app?") from the files directly inside it.
//! Detectors never recurse and never fail: an unreadable candidate file
//! counts as absent. The registry runs them in a fixed priority order and
//! the first positive answer wins.

mod function_app;
mod go;
mod node;
mod php;
mod python;
mod ruby;

pub use function_app::{FunctionAppDetector, HostSignals, FUNCTIONS_RUNTIME_VAR};
pub use go::GoDetector;
pub use node::NodeDetector;
pub use php::PhpDetector;
pub use python::PythonDetector;
pub use ruby::RubyDetector;

use crate::config::Platform;
use crate::fs::FileSystem;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

crate::define_id_enum! {
    /// Project signatures, in no particular order
    Signature {
        FunctionApp => "function_app" : "Function App" | "functions",
        Node => "node" : "Node.js",
        Python => "python" : "Python",
        Go => "go" : "Go" | "golang",
        Ruby => "ruby" : "Ruby",
        Php => "php" : "PHP",
    }
}

/// Start pages that mark a directory as a plain static/IIS site
pub const START_PAGES: &[&str] = &[
    "default.htm",
    "default.html",
    "default.asp",
    "index.htm",
    "index.html",
    "iisstart.htm",
    "default.aspx",
    "index.php",
    "hostingstart.html",
];

/// Everything a detector may look at
pub struct DetectContext<'a> {
    pub fs: &'a dyn FileSystem,
    pub platform: Platform,
    pub host: &'a HostSignals,
}

impl<'a> DetectContext<'a> {
    pub fn new(fs: &'a dyn FileSystem, platform: Platform, host: &'a HostSignals) -> Self {
        Self { fs, platform, host }
    }
}

pub trait SignatureDetector: Send + Sync {
    fn signature(&self) -> Signature;

    /// Detectors that only apply when deploying to a Linux host
    fn linux_only(&self) -> bool {
        false
    }

    /// Whether `dir` carries this signature; must not recurse below `dir`
    fn detect(&self, ctx: &DetectContext<'_>, dir: &Path) -> bool;
}

pub(crate) fn any_file(ctx: &DetectContext<'_>, dir: &Path, names: &[&str]) -> bool {
    names.iter().any(|name| ctx.fs.is_file(&dir.join(name)))
}

pub(crate) fn has_start_page(ctx: &DetectContext<'_>, dir: &Path, except: &[&str]) -> bool {
    START_PAGES
        .iter()
        .filter(|page| !except.contains(page))
        .any(|page| ctx.fs.is_file(&dir.join(page)))
}

/// One row of a full detector evaluation
#[derive(Debug, Clone, Serialize)]
pub struct SignatureReport {
    pub signature: Signature,
    /// False when the detector does not run on the current platform
    pub applicable: bool,
    pub matched: bool,
}

#[derive(Clone)]
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn SignatureDetector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Function App, Node, Python, Go, Ruby, PHP
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FunctionAppDetector));
        registry.register(Arc::new(NodeDetector));
        registry.register(Arc::new(PythonDetector));
        registry.register(Arc::new(GoDetector));
        registry.register(Arc::new(RubyDetector));
        registry.register(Arc::new(PhpDetector));
        registry
    }

    pub fn register(&mut self, detector: Arc<dyn SignatureDetector>) {
        self.detectors.push(detector);
    }

    fn applicable(&self, platform: Platform) -> impl Iterator<Item = &Arc<dyn SignatureDetector>> {
        self.detectors
            .iter()
            .filter(move |d| !d.linux_only() || platform.is_linux())
    }

    /// First signature, in priority order, that matches `dir`
    pub fn first_match(&self, ctx: &DetectContext<'_>, dir: &Path) -> Option<Signature> {
        self.applicable(ctx.platform)
            .find(|d| d.detect(ctx, dir))
            .map(|d| d.signature())
    }

    /// Evaluates every detector, for diagnostics
    pub fn evaluate_all(&self, ctx: &DetectContext<'_>, dir: &Path) -> Vec<SignatureReport> {
        self.detectors
            .iter()
            .map(|d| {
                let applicable = !d.linux_only() || ctx.platform.is_linux();
                SignatureReport {
                    signature: d.signature(),
                    applicable,
                    matched: applicable && d.detect(ctx, dir),
                }
            })
            .collect()
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
