use foreman_coordinator::TaskCoordinator;
use foreman_deps::tracing::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::alerts::{Alert, RemediationAction};

/// Reason recorded when the monitor releases a stale assignment
pub const STALE_RELEASE_REASON: &str = "stale";

/// What auto-remediation did during one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    /// Stale assignments force-released
    pub cleanup_stale_tasks: usize,
    /// Orphaned workspaces removed
    pub cleanup_orphaned_workspaces: usize,
    /// Actions that failed, one message each
    #[serde(default)]
    pub failures: Vec<String>,
}

impl RemediationOutcome {
    /// Whether anything was changed.
    pub fn acted(&self) -> bool {
        self.cleanup_stale_tasks > 0 || self.cleanup_orphaned_workspaces > 0
    }
}

/// Runs every action requested by `alerts`, at most once per action.
///
/// State is re-read from the coordinator at this point, not taken from the snapshot
/// that raised the alert. Failures are collected instead of returned.
pub fn auto_remediate(coordinator: &TaskCoordinator, alerts: &[Alert]) -> RemediationOutcome {
    let actions: HashSet<RemediationAction> = alerts
        .iter()
        .filter_map(|alert| alert.auto_remediation)
        .collect();

    let mut outcome = RemediationOutcome::default();
    if actions.contains(&RemediationAction::CleanupStaleTasks) {
        release_stale(coordinator, &mut outcome);
    }
    if actions.contains(&RemediationAction::CleanupOrphanedWorkspaces) {
        remove_orphans(coordinator, &mut outcome);
    }
    outcome
}

fn release_stale(coordinator: &TaskCoordinator, outcome: &mut RemediationOutcome) {
    let stale = match coordinator.detect_stale() {
        Ok(stale) => stale,
        Err(error) => {
            warn!("Could not detect stale tasks: {error}");
            outcome.failures.push(format!("detect stale tasks: {error}"));
            return;
        }
    };

    for entry in stale {
        match coordinator.force_release(&entry.task_id, STALE_RELEASE_REASON) {
            Ok(true) => {
                info!("Released stale task {}", entry.task_id);
                outcome.cleanup_stale_tasks += 1;
            }
            Ok(false) => {}
            Err(error) => {
                warn!("Failed to release stale task {}: {error}", entry.task_id);
                outcome
                    .failures
                    .push(format!("release {}: {error}", entry.task_id));
            }
        }
    }
}

fn remove_orphans(coordinator: &TaskCoordinator, outcome: &mut RemediationOutcome) {
    let orphans = match coordinator.orphaned_workspaces() {
        Ok(orphans) => orphans,
        Err(error) => {
            warn!("Could not list orphaned workspaces: {error}");
            outcome
                .failures
                .push(format!("list orphaned workspaces: {error}"));
            return;
        }
    };

    for name in orphans {
        match coordinator.remove_orphaned_workspace(&name) {
            Ok(true) => {
                info!("Removed orphaned workspace {name}");
                outcome.cleanup_orphaned_workspaces += 1;
            }
            Ok(false) => {}
            Err(error) => {
                warn!("Failed to remove orphaned workspace {name}: {error}");
                outcome.failures.push(format!("remove {name}: {error}"));
            }
        }
    }
}
