use super::{DetectContext, Signature, SignatureDetector};
use std::path::Path;
use tracing::debug;

pub struct GoDetector;

fn declares_main_package(content: &str) -> bool {
    content
        .lines()
        .any(|line| line.trim_start().to_lowercase().starts_with("package main"))
}

impl SignatureDetector for GoDetector {
    fn signature(&self) -> Signature {
        Signature::Go
    }

    fn detect(&self, ctx: &DetectContext<'_>, dir: &Path) -> bool {
        let Ok(sources) = ctx.fs.files_with_extension(dir, "go") else {
            return false;
        };

        sources.iter().any(|path| match ctx.fs.read_to_string(path) {
            Ok(content) => declares_main_package(&content),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping unreadable Go source");
                false
            }
        })
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
        main_package = { "main.go", "package main\n\nfunc main() {}", true },
        upper_case = { "server.go", "// tool\nPACKAGE MAIN", true },
        library = { "lib.go", "package handlers", false },
        nested = { "cmd/app/main.go", "package main", false },
        not_go = { "main.txt", "package main", false },
    )]
    fn test_go_signature(file: &str, content: &str, expected: bool) {
        let fs = MockFileSystem::new();
        fs.add_file(file, content);
        let host = HostSignals::default();
        let ctx = DetectContext::new(&fs, Platform::Linux, &host);

        assert_eq!(GoDetector.detect(&ctx, fs.root()), expected);
    }

    #[test]
    fn test_main_package_in_any_file() {
        let fs = MockFileSystem::new();
        fs.add_file("a.go", "package util");
        fs.add_file("b.go", "package main");
        let host = HostSignals::default();
        let ctx = DetectContext::new(&fs, Platform::Linux, &host);

        assert!(GoDetector.detect(&ctx, fs.root()));
    }
}
