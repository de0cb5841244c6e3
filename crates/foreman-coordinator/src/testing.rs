//! Test doubles for the coordinator's collaborators.

use crate::isolation::WorkspaceIsolation;
use foreman_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Isolation provider that creates plain directories and records every call.
#[derive(Debug, Default)]
pub struct InMemoryIsolation {
    created: Mutex<Vec<(String, PathBuf)>>,
    removal_attempts: Mutex<Vec<PathBuf>>,
    merges: Mutex<Vec<(String, String)>>,
    fail_create: AtomicBool,
    fail_remove: AtomicBool,
    fail_merge: AtomicBool,
}

impl InMemoryIsolation {
    /// Creates a provider where every operation succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `create` calls fail.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `remove` calls fail.
    pub fn fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `merge` calls fail.
    pub fn fail_merge(&self, fail: bool) {
        self.fail_merge.store(fail, Ordering::SeqCst);
    }

    /// Branches and paths of every successful `create`.
    pub fn created(&self) -> Vec<(String, PathBuf)> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Paths of every `remove` call, including failed ones.
    pub fn removal_attempts(&self) -> Vec<PathBuf> {
        self.removal_attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Branches and messages of every successful `merge`.
    pub fn merges(&self) -> Vec<(String, String)> {
        self.merges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WorkspaceIsolation for InMemoryIsolation {
    fn create(&self, branch: &str, path: &Path) -> Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::IsolationFailure(format!(
                "injected create failure for {branch}"
            )));
        }
        fs::create_dir_all(path)?;
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((branch.to_owned(), path.to_path_buf()));
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.removal_attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(Error::IsolationFailure(format!(
                "injected remove failure for {}",
                path.display()
            )));
        }
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    fn merge(&self, branch: &str, message: &str) -> Result<()> {
        if self.fail_merge.load(Ordering::SeqCst) {
            return Err(Error::IsolationFailure(format!(
                "injected merge failure for {branch}"
            )));
        }
        self.merges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((branch.to_owned(), message.to_owned()));
        Ok(())
    }
}
