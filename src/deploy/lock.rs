//! Per-repository deployment lock
//!
//! An OS file lock on `<deployments>/deployment.lock`. Acquisition never
//! blocks: a held lock is reported as contention so the caller can queue a
//! pending deployment instead of waiting. The lock is released when the
//! guard drops, including when the process dies.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const LOCK_FILENAME: &str = "deployment.lock";

/// Written into the lock file by the holder, for contention messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    /// Who holds the lock, e.g. the deployer and branch
    pub owner: String,
    pub acquired_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("A deployment by {owner} is already running (PID {pid}, started {acquired_at})")]
    Contention {
        owner: String,
        pid: u32,
        acquired_at: String,
    },

    #[error("A deployment is already running (lock file {lock_path})")]
    ContentionUnknown { lock_path: PathBuf },

    #[error("Failed to lock {lock_path}: {source}")]
    Io {
        lock_path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub fn is_contention(&self) -> bool {
        matches!(self, LockError::Contention { .. } | LockError::ContentionUnknown { .. })
    }
}

/// Exclusive hold on one repository's deployment state
#[derive(Debug)]
pub struct DeploymentLock {
    file: File,
    lock_path: PathBuf,
}

impl DeploymentLock {
    pub fn lock_path_in(deployments_path: &Path) -> PathBuf {
        deployments_path.join(LOCK_FILENAME)
    }

    /// Takes the lock or reports contention immediately
    pub fn try_acquire(deployments_path: &Path, owner: &str) -> Result<Self, LockError> {
        let lock_path = Self::lock_path_in(deployments_path);
        let io_err = |source| LockError::Io {
            lock_path: lock_path.clone(),
            source,
        };

        fs::create_dir_all(deployments_path).map_err(io_err)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(io_err)?;

        if let Err(err) = try_lock(&file) {
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(read_contention(&lock_path));
            }
            return Err(io_err(err));
        }

        let lock = Self {
            file,
            lock_path: lock_path.clone(),
        };
        lock.write_metadata(owner).map_err(io_err)?;
        debug!(lock = %lock.lock_path.display(), "Acquired deployment lock");
        Ok(lock)
    }

    /// Whether some other holder currently owns the lock
    pub fn is_held(deployments_path: &Path) -> bool {
        match Self::try_acquire(deployments_path, "probe") {
            Ok(_) => false,
            Err(e) => e.is_contention(),
        }
    }

    fn write_metadata(&self, owner: &str) -> io::Result<()> {
        let metadata = LockMetadata {
            pid: std::process::id(),
            owner: owner.to_string(),
            acquired_at: chrono::Utc::now(),
        };
        let mut file = &self.file;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        serde_json::to_writer(&mut file, &metadata).map_err(io::Error::other)?;
        file.flush()
    }

    pub fn read_metadata(&self) -> io::Result<LockMetadata> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).map_err(io::Error::other)
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

fn read_contention(lock_path: &Path) -> LockError {
    let metadata = fs::read_to_string(lock_path)
        .ok()
        .and_then(|contents| serde_json::from_str::<LockMetadata>(&contents).ok());

    match metadata {
        Some(metadata) => LockError::Contention {
            owner: metadata.owner,
            pid: metadata.pid,
            acquired_at: metadata.acquired_at.to_rfc3339(),
        },
        None => LockError::ContentionUnknown {
            lock_path: lock_path.to_path_buf(),
        },
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };

    let handle = file.as_raw_handle() as HANDLE;

    // SAFETY: OVERLAPPED is plain data and valid zeroed; the handle is open.
    let result = unsafe {
        let mut overlapped = std::mem::zeroed();
        LockFileEx(
            handle,
            LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
            0,
            1,
            0,
            &mut overlapped,
        )
    };

    if result == 0 {
        let err = io::Error::last_os_error();
        // ERROR_LOCK_VIOLATION
        if err.raw_os_error() == Some(33) {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        Err(err)
    } else {
        Ok(())
    }
}

#[cfg(not(any(unix, windows)))]
fn try_lock(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_writes_metadata() {
        let temp = TempDir::new().unwrap();
        let lock = DeploymentLock::try_acquire(temp.path(), "abc").unwrap();

        assert!(lock.lock_path().exists());
        let metadata = lock.read_metadata().unwrap();
        assert_eq!(metadata.owner, "abc");
        assert_eq!(metadata.pid, std::process::id());
    }

    #[test]
    fn test_second_acquire_is_contention() {
        let temp = TempDir::new().unwrap();
        let _held = DeploymentLock::try_acquire(temp.path(), "first").unwrap();

        let err = DeploymentLock::try_acquire(temp.path(), "second").unwrap_err();
        assert!(err.is_contention());
        assert!(err.to_string().contains("first"));
        assert!(DeploymentLock::is_held(temp.path()));
    }

    #[test]
    fn test_released_on_drop() {
        let temp = TempDir::new().unwrap();
        {
            let _lock = DeploymentLock::try_acquire(temp.path(), "first").unwrap();
        }
        assert!(!DeploymentLock::is_held(temp.path()));
        DeploymentLock::try_acquire(temp.path(), "second").unwrap();
    }

    #[test]
    fn test_creates_deployments_directory() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        DeploymentLock::try_acquire(&nested, "abc").unwrap();
        assert!(nested.join(LOCK_FILENAME).exists());
    }
}
