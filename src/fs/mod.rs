//! FileSystem abstraction for testable file operations

mod mock;
mod real;
mod r#trait;

pub use mock::MockFileSystem;
pub use r#trait::{has_extension, DirEntry, FileSystem, FileType, SearchScope};
pub use real::RealFileSystem;
