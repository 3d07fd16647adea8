use super::{any_file, has_start_page, DetectContext, Signature, SignatureDetector};
use std::path::Path;

pub struct RubyDetector;

impl SignatureDetector for RubyDetector {
    fn signature(&self) -> Signature {
        Signature::Ruby
    }

    fn linux_only(&self) -> bool {
        true
    }

    fn detect(&self, ctx: &DetectContext<'_>, dir: &Path) -> bool {
        if ctx.fs.is_file(&dir.join("Gemfile")) {
            return true;
        }

        // Gemfile.lock or config.ru alone only suggest rails; a start page means a static site.
        any_file(ctx, dir, &["Gemfile.lock", "config.ru"]) && !has_start_page(ctx, dir, &[])
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
        gemfile = { &["Gemfile"], true },
        gemfile_with_start_page = { &["Gemfile", "index.html"], true },
        lockfile = { &["Gemfile.lock"], true },
        rackup = { &["config.ru"], true },
        rackup_with_start_page = { &["config.ru", "default.htm"], false },
        lockfile_with_php_start_page = { &["Gemfile.lock", "index.php"], false },
        nothing = { &["README.md"], false },
    )]
    fn test_ruby_signature(files: &[&str], expected: bool) {
        let fs = MockFileSystem::new();
        for file in files {
            fs.add_file(file, "");
        }
        let host = HostSignals::default();
        let ctx = DetectContext::new(&fs, Platform::Linux, &host);

        assert_eq!(RubyDetector.detect(&ctx, fs.root()), expected);
    }
}
