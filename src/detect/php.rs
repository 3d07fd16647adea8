use super::{has_start_page, DetectContext, Signature, SignatureDetector};
use std::path::Path;

pub struct PhpDetector;

impl SignatureDetector for PhpDetector {
    fn signature(&self) -> Signature {
        Signature::Php
    }

    fn linux_only(&self) -> bool {
        true
    }

    fn detect(&self, ctx: &DetectContext<'_>, dir: &Path) -> bool {
        if ctx.fs.is_file(&dir.join("composer.json")) {
            return true;
        }

        // index.php is the app's own entry point, not a sign of a static site.
        ctx.fs.is_file(&dir.join("composer.lock")) && !has_start_page(ctx, dir, &["index.php"])
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
        composer_json = { &["composer.json"], true },
        lockfile = { &["composer.lock"], true },
        lockfile_with_index_php = { &["composer.lock", "index.php"], true },
        lockfile_with_start_page = { &["composer.lock", "hostingstart.html"], false },
        nothing = { &["index.php"], false },
    )]
    fn test_php_signature(files: &[&str], expected: bool) {
        let fs = MockFileSystem::new();
        for file in files {
            fs.add_file(file, "");
        }
        let host = HostSignals::default();
        let ctx = DetectContext::new(&fs, Platform::Linux, &host);

        assert_eq!(PhpDetector.detect(&ctx, fs.root()), expected);
    }
}
