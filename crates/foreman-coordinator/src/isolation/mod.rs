//! Isolated per-task workspaces.
//!
//! The coordinator never talks to version control directly; it goes through
//! [`WorkspaceIsolation`], so tests can substitute an in-memory provider.

use foreman_core::Result;
use std::path::Path;

/// Git worktree provider
pub mod git;

pub use git::GitWorktreeIsolation;

/// Creates, removes and merges isolated workspaces.
///
/// Calls block until the provider finishes. Failures are reported as
/// [`foreman_core::Error::IsolationFailure`].
pub trait WorkspaceIsolation: Send + Sync {
    /// Creates a workspace at `path` on a new branch `branch`.
    ///
    /// # Errors
    /// Returns an error if the workspace or branch cannot be created
    fn create(&self, branch: &str, path: &Path) -> Result<()>;

    /// Removes the workspace at `path`.
    ///
    /// # Errors
    /// Returns an error if the workspace cannot be removed; callers treat this as
    /// best-effort
    fn remove(&self, path: &Path) -> Result<()>;

    /// Merges `branch` into the main line with `message`.
    ///
    /// # Errors
    /// Returns an error if the merge fails
    fn merge(&self, branch: &str, message: &str) -> Result<()>;
}
