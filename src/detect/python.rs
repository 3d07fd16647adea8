use super::{DetectContext, Signature, SignatureDetector};
use std::path::Path;
use tracing::debug;

pub struct PythonDetector;

impl PythonDetector {
    fn has_python_sources(ctx: &DetectContext<'_>, dir: &Path) -> bool {
        ctx.fs
            .files_with_extension(dir, "py")
            .is_ok_and(|files| !files.is_empty())
    }

    fn runtime_mentions_python(ctx: &DetectContext<'_>, dir: &Path) -> bool {
        let runtime = dir.join("runtime.txt");
        if !ctx.fs.is_file(&runtime) {
            return false;
        }
        match ctx.fs.read_to_string(&runtime) {
            Ok(content) => content.to_lowercase().contains("python"),
            Err(e) => {
                debug!(path = %runtime.display(), error = %e, "Unreadable runtime.txt");
                false
            }
        }
    }
}

impl SignatureDetector for PythonDetector {
    fn signature(&self) -> Signature {
        Signature::Python
    }

    fn detect(&self, ctx: &DetectContext<'_>, dir: &Path) -> bool {
        ctx.fs.is_file(&dir.join("requirements.txt"))
            && (Self::has_python_sources(ctx, dir) || Self::runtime_mentions_python(ctx, dir))
    }
}
