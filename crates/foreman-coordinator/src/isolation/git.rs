use super::WorkspaceIsolation;
use foreman_core::{Error, Result};
use foreman_deps::tracing::{debug, info};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Workspaces backed by `git worktree`, one branch per task.
#[derive(Debug, Clone)]
pub struct GitWorktreeIsolation {
    repo_root: PathBuf,
    main_branch: String,
}

impl GitWorktreeIsolation {
    /// Creates a provider running git in `repo_root`, merging into `main_branch`.
    pub fn new(repo_root: PathBuf, main_branch: impl Into<String>) -> Self {
        Self {
            repo_root,
            main_branch: main_branch.into(),
        }
    }

    fn git<I, S>(&self, action: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|error| Error::IsolationFailure(format!("Failed to run git: {error}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::IsolationFailure(format!(
                "Failed to {action}: {}",
                stderr.trim()
            )));
        }

        debug!("git {action} succeeded in {:?}", self.repo_root);
        Ok(())
    }
}

impl WorkspaceIsolation for GitWorktreeIsolation {
    fn create(&self, branch: &str, path: &Path) -> Result<()> {
        self.git(
            "create worktree",
            [
                OsStr::new("worktree"),
                OsStr::new("add"),
                path.as_os_str(),
                OsStr::new("-b"),
                OsStr::new(branch),
            ],
        )?;
        info!("Created worktree {path:?} on branch {branch}");
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.git(
            "remove worktree",
            [
                OsStr::new("worktree"),
                OsStr::new("remove"),
                path.as_os_str(),
                OsStr::new("--force"),
            ],
        )?;
        info!("Removed worktree {path:?}");
        Ok(())
    }

    fn merge(&self, branch: &str, message: &str) -> Result<()> {
        self.git("check out main branch", ["checkout", self.main_branch.as_str()])?;
        self.git("merge branch", ["merge", "--no-ff", branch, "-m", message])?;
        info!("Merged {branch} into {}", self.main_branch);
        Ok(())
    }
}
