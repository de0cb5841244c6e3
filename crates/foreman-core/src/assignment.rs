use std::path::PathBuf;

use foreman_deps::chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::TaskId;

/// Status every ledger entry carries while it exists.
pub const ASSIGNMENT_IN_PROGRESS: &str = "in_progress";

/// Rejects values that would split or end a ledger table row.
///
/// # Errors
/// Returns `InvalidInput` when `value` contains `|` or a line break
pub fn check_ledger_cell(field: &str, value: &str) -> Result<()> {
    if value.contains(['|', '\r', '\n']) {
        return Err(Error::InvalidInput(format!(
            "{field} '{}' must not contain '|' or line breaks",
            value.escape_debug()
        )));
    }
    Ok(())
}

/// One active claim, as held in the assignment ledger.
///
/// The ledger holds exactly one record per claimed task; its length is the
/// concurrency counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// Claimed task
    pub task_id: TaskId,
    /// Agent holding the claim
    pub agent_id: String,
    /// Role the agent claimed under
    pub role: String,
    /// Time of the claim
    pub claimed_at: DateTime<Utc>,
    /// Isolated workspace of the claim
    #[serde(rename = "worktree_path")]
    pub workspace_path: PathBuf,
    /// Always [`ASSIGNMENT_IN_PROGRESS`]
    pub status: String,
}

impl AssignmentRecord {
    /// Creates an in-progress record.
    pub fn new(
        task_id: TaskId,
        agent_id: impl Into<String>,
        role: impl Into<String>,
        claimed_at: DateTime<Utc>,
        workspace_path: PathBuf,
    ) -> Self {
        Self {
            task_id,
            agent_id: agent_id.into(),
            role: role.into(),
            claimed_at,
            workspace_path,
            status: ASSIGNMENT_IN_PROGRESS.to_owned(),
        }
    }

    /// Directory name of the workspace, used to match directories on disk.
    pub fn workspace_name(&self) -> Option<String> {
        self.workspace_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Checks that every text field fits in a single ledger cell.
    ///
    /// # Errors
    /// Returns `InvalidInput` naming the first field that does not
    pub fn check_cells(&self) -> Result<()> {
        check_ledger_cell("task id", self.task_id.as_str())?;
        check_ledger_cell("agent id", &self.agent_id)?;
        check_ledger_cell("role", &self.role)?;
        check_ledger_cell("workspace path", &self.workspace_path.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_deps::chrono::TimeZone as _;

    fn record(agent: &str, role: &str) -> AssignmentRecord {
        AssignmentRecord::new(
            TaskId::from("TASK-20260201-0001"),
            agent,
            role,
            Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap(),
            PathBuf::from("worktrees/TASK-20260201-0001"),
        )
    }

    #[test]
    fn test_plain_values_fit_a_cell() {
        assert!(record("agent-1", "implementer").check_cells().is_ok());
        assert!(record("agent with spaces", "any").check_cells().is_ok());
    }

    #[test]
    fn test_separators_and_line_breaks_are_rejected() {
        for (agent, role) in [
            ("team|agent-1", "any"),
            ("agent-1\nTASK-x", "any"),
            ("agent-1", "impl\r"),
        ] {
            let result = record(agent, role).check_cells();
            assert!(matches!(result, Err(Error::InvalidInput(_))), "{agent:?} {role:?}");
        }
    }
}
