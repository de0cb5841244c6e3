//! Task records and their lifecycle states.

use core::fmt;
use core::str::FromStr;
use std::path::PathBuf;

use foreman_deps::chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Role value meaning "any agent role may take this task".
pub const ANY_ROLE: &str = "any";

/// Scope used when a task does not restrict the files it may touch.
pub const UNRESTRICTED_SCOPE: &str = "**/*";

const ID_PREFIX: &str = "TASK-";

/// Identifier of a task, e.g. `TASK-20260101-0007`.
///
/// The trailing number is a store-wide sequence, so ids never collide as long as they
/// are allocated while the state lock is held.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Builds the id for sequence number `sequence` allocated on `date`.
    pub fn generate(date: NaiveDate, sequence: u64) -> Self {
        Self(format!(
            "{ID_PREFIX}{date}-{sequence:04}",
            date = date.format("%Y%m%d")
        ))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the sequence number of a generated id, if it has one.
    pub fn sequence(&self) -> Option<u64> {
        let rest = self.0.strip_prefix(ID_PREFIX)?;
        let (_, sequence) = rest.rsplit_once('-')?;
        sequence.parse().ok()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be claimed
    Available,
    /// Held by an agent in an isolated workspace
    Claimed,
    /// Approved and merged; terminal
    Completed,
}

impl TaskStatus {
    /// Returns the on-disk name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "available" => Ok(Self::Available),
            "claimed" => Ok(Self::Claimed),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Task priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Picked before everything else
    High,
    /// Normal priority
    #[default]
    Medium,
    /// Picked last
    Low,
}

impl Priority {
    /// Scheduling rank; lower ranks are handed out first.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Review outcome passed to `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Merge the task branch and mark the task completed
    Approved,
    /// Discard the claim and put the task back in the queue
    Rejected,
}

impl fmt::Display for Verdict {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        })
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!(
                "invalid verdict '{other}', must be 'approved' or 'rejected'"
            )),
        }
    }
}

/// A unit of work tracked by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    #[serde(rename = "task_id")]
    pub id: TaskId,
    /// Short title
    pub title: String,
    /// Free-text description
    pub description: String,
    /// Required agent role, or [`ANY_ROLE`]
    pub role: String,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Scheduling priority
    pub priority: Priority,
    /// Glob patterns of files the task may touch
    pub files_in_scope: Vec<String>,
    /// Ordered acceptance criteria
    pub acceptance_criteria: Vec<String>,
    /// Creation time
    #[serde(deserialize_with = "lenient_time::required")]
    pub created_at: DateTime<Utc>,
    /// Agent holding the claim
    #[serde(default)]
    pub claimed_by: Option<String>,
    /// Time the claim was taken
    #[serde(default, deserialize_with = "lenient_time::optional")]
    pub claimed_at: Option<DateTime<Utc>>,
    /// Time the task was approved
    #[serde(default, deserialize_with = "lenient_time::optional")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Isolated workspace of the claim
    #[serde(default, rename = "worktree_path")]
    pub workspace_path: Option<PathBuf>,
}

impl Task {
    /// Returns whether an agent with `role` may take this task.
    pub fn accepts_role(&self, role: &str) -> bool {
        self.role == role || self.role == ANY_ROLE
    }

    /// Moves the task into `claimed`, recording who holds it and where.
    pub fn mark_claimed(&mut self, agent_id: &str, at: DateTime<Utc>, workspace: PathBuf) {
        self.status = TaskStatus::Claimed;
        self.claimed_by = Some(agent_id.to_owned());
        self.claimed_at = Some(at);
        self.workspace_path = Some(workspace);
    }

    /// Puts the task back into `available` with every claim field cleared.
    pub fn mark_available(&mut self) {
        self.status = TaskStatus::Available;
        self.claimed_by = None;
        self.claimed_at = None;
        self.workspace_path = None;
        self.completed_at = None;
    }

    /// Moves the task into the terminal `completed` status.
    ///
    /// Claim fields are kept as history of who delivered the work.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(at);
    }

    /// Time from creation to completion, for completed tasks.
    pub fn cycle_time_seconds(&self) -> Option<f64> {
        self.completed_at.map(|completed| {
            (completed - self.created_at).num_milliseconds() as f64 / 1000.0
        })
    }

    /// Checks that the claim and completion fields agree with the status.
    ///
    /// # Errors
    /// Returns a description of the first inconsistency found.
    pub fn check_consistency(&self) -> Result<(), String> {
        let claim_fields = [
            self.claimed_by.is_some(),
            self.claimed_at.is_some(),
            self.workspace_path.is_some(),
        ];
        match self.status {
            TaskStatus::Available if claim_fields.iter().any(|set| *set) => {
                Err("available task carries claim fields".to_owned())
            }
            TaskStatus::Claimed if !claim_fields.iter().all(|set| *set) => {
                Err("claimed task is missing claim fields".to_owned())
            }
            TaskStatus::Completed if self.completed_at.is_none() => {
                Err("completed task has no completed_at".to_owned())
            }
            TaskStatus::Available | TaskStatus::Claimed if self.completed_at.is_some() => {
                Err(format!("{} task has completed_at set", self.status))
            }
            _ => Ok(()),
        }
    }
}

/// Timestamp fields accept zone-less ISO-8601 values as UTC.
mod lenient_time {
    use foreman_deps::chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize as _, Deserializer};

    use crate::clock::parse_timestamp;

    fn parse<E: Error>(raw: &str) -> Result<DateTime<Utc>, E> {
        parse_timestamp(raw).ok_or_else(|| E::custom(format!("invalid timestamp '{raw}'")))
    }

    pub(super) fn required<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        parse(&String::deserialize(deserializer)?)
    }

    pub(super) fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse(&raw))
            .transpose()
    }
}

/// Parameters for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Short title
    pub title: String,
    /// Free-text description
    pub description: String,
    /// Required role
    pub role: String,
    /// Scheduling priority
    pub priority: Priority,
    /// Glob patterns, unrestricted when `None`
    pub files_in_scope: Option<Vec<String>>,
    /// Acceptance criteria, configured defaults when `None`
    pub acceptance_criteria: Option<Vec<String>>,
}

impl NewTask {
    /// Creates parameters for a medium-priority task open to any role.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            role: ANY_ROLE.to_owned(),
            priority: Priority::Medium,
            files_in_scope: None,
            acceptance_criteria: None,
        }
    }

    /// Sets the required role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Sets the priority level.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Restricts the files the task may touch.
    #[must_use]
    pub fn with_files_in_scope(mut self, patterns: Vec<String>) -> Self {
        self.files_in_scope = Some(patterns);
        self
    }

    /// Overrides the default acceptance criteria.
    #[must_use]
    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = Some(criteria);
        self
    }

    /// Builds the `available` task record.
    pub fn into_task(
        self,
        id: TaskId,
        created_at: DateTime<Utc>,
        default_criteria: &[String],
    ) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            role: self.role,
            status: TaskStatus::Available,
            priority: self.priority,
            files_in_scope: self
                .files_in_scope
                .unwrap_or_else(|| vec![UNRESTRICTED_SCOPE.to_owned()]),
            acceptance_criteria: self
                .acceptance_criteria
                .unwrap_or_else(|| default_criteria.to_vec()),
            created_at,
            claimed_by: None,
            claimed_at: None,
            completed_at: None,
            workspace_path: None,
        }
    }
}
