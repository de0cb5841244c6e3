use foreman_core::{AssignmentRecord, Clock, CoordinatorConfig};
use foreman_deps::chrono::{DateTime, Duration, Utc};
use foreman_deps::tracing::debug;
use foreman_deps::walkdir::{DirEntry, WalkDir};
use std::path::Path;
use std::sync::Arc;

/// Flags assignments that are old and whose workspace has gone quiet.
#[derive(Clone)]
pub struct StalenessDetector {
    stale_threshold: Duration,
    recent_window: Duration,
    clock: Arc<dyn Clock>,
}

impl StalenessDetector {
    /// Creates a detector with explicit thresholds.
    pub fn new(stale_threshold: Duration, recent_window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            stale_threshold,
            recent_window,
            clock,
        }
    }

    /// Creates a detector using the configured thresholds.
    pub fn from_config(config: &CoordinatorConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.stale_threshold(), config.recent_window(), clock)
    }

    /// Returns the entries older than the threshold with no recent workspace activity.
    pub fn detect(&self, entries: &[AssignmentRecord]) -> Vec<AssignmentRecord> {
        let now = self.clock.now();
        entries
            .iter()
            .filter(|entry| self.is_stale(entry, now))
            .cloned()
            .collect()
    }

    /// Checks a single entry at instant `now`.
    pub fn is_stale(&self, entry: &AssignmentRecord, now: DateTime<Utc>) -> bool {
        let age = now - entry.claimed_at;
        if age <= self.stale_threshold {
            return false;
        }
        let active = has_recent_activity(&entry.workspace_path, now - self.recent_window);
        if !active {
            debug!(
                "Assignment {} is stale: claimed {} minutes ago, no recent activity",
                entry.task_id,
                age.num_minutes()
            );
        }
        !active
    }
}

fn is_vcs_metadata(entry: &DirEntry) -> bool {
    entry.file_name() == ".git"
}

/// Whether any file under `workspace` (outside `.git`) changed after `since`.
///
/// A workspace that does not exist has no activity.
fn has_recent_activity(workspace: &Path, since: DateTime<Utc>) -> bool {
    if !workspace.is_dir() {
        return false;
    }

    WalkDir::new(workspace)
        .into_iter()
        .filter_entry(|entry| !is_vcs_metadata(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok()?.modified().ok())
        .any(|modified| DateTime::<Utc>::from(modified) > since)
}
