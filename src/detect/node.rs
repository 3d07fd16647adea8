use super::{any_file, DetectContext, Signature, SignatureDetector};
use std::path::Path;

const NODE_MARKERS: &[&str] = &["server.js", "app.js", "package.json"];

pub struct NodeDetector;

impl SignatureDetector for NodeDetector {
    fn signature(&self) -> Signature {
        Signature::Node
    }

    fn detect(&self, ctx: &DetectContext<'_>, dir: &Path) -> bool {
        any_file(ctx, dir, NODE_MARKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;
    use crate::detect::HostSignals;
    use crate::fs::MockFileSystem;
    use yare::parameterized;

    #[parameterized(
        package_json = { "package.json", true },
        server_js = { "server.js", true },
        app_js = { "app.js", true },
        index_js = { "index.js", false },
        nested_package_json = { "web/package.json", false },
    )]
    fn test_node_markers(file: &str, expected: bool) {
        let fs = MockFileSystem::new();
        fs.add_file(file, "");
        let host = HostSignals::default();
        let ctx = DetectContext::new(&fs, Platform::Windows, &host);

        assert_eq!(NodeDetector.detect(&ctx, fs.root()), expected);
    }
}
