use foreman_core::Result;
use foreman_deps::fs2::FileExt;
use foreman_deps::tracing::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock serializing coordinator mutations across processes.
///
/// Every read-check-write sequence over the task collection and the ledger runs
/// while one of these is held. The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Blocks until the lock at `path` is acquired.
    ///
    /// # Errors
    /// Returns an error if the lock file cannot be created or locked
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        debug!("Acquired state lock {path:?}");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!("Failed to release state lock {:?}: {error}", self.path);
        }
    }
}
