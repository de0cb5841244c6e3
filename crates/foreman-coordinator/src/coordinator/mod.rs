use std::collections::HashSet;
use std::fs;
use std::path::{self, Component, Path, PathBuf};
use std::sync::Arc;

use foreman_core::{
    AssignmentRecord, Clock, Error, ForemanConfig, NewTask, Result, SystemClock, Task, TaskId,
    TaskStatus, Verdict, check_ledger_cell,
};
use foreman_deps::glob::Pattern;
use foreman_deps::tracing::{debug, info, warn};

use crate::decisions::{Decision, DecisionLog};
use crate::isolation::{GitWorktreeIsolation, WorkspaceIsolation};
use crate::lock::StateLock;
use crate::staleness::StalenessDetector;
use crate::store::{AssignmentLedger, TaskStore};

#[cfg(test)]
mod tests;

/// Owner recorded on decisions taken by the coordinator itself
const DECISION_OWNER: &str = "foreman-coordinator";

/// Task state machine: `available -> claimed -> {completed | available}`.
///
/// Every mutating operation holds the state lock for its whole
/// read-check-write sequence, so concurrent callers (threads or processes) cannot
/// claim the same task twice or push the ledger past the concurrency cap.
pub struct TaskCoordinator {
    store: TaskStore,
    ledger: AssignmentLedger,
    decisions: DecisionLog,
    isolation: Arc<dyn WorkspaceIsolation>,
    clock: Arc<dyn Clock>,
    detector: StalenessDetector,
    lock_path: PathBuf,
    workspace_dir: PathBuf,
    branch_prefix: String,
    max_concurrent: usize,
    default_criteria: Vec<String>,
}

impl TaskCoordinator {
    /// Creates a coordinator over the files under `root` with explicit collaborators.
    pub fn new(
        root: &Path,
        config: &ForemanConfig,
        isolation: Arc<dyn WorkspaceIsolation>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let paths = config.paths.resolve(root);
        let coordinator = &config.coordinator;

        Self {
            store: TaskStore::new(paths.tasks_file),
            ledger: AssignmentLedger::new(paths.ledger_file, coordinator.max_concurrent),
            decisions: DecisionLog::new(paths.decisions_file),
            detector: StalenessDetector::from_config(coordinator, Arc::clone(&clock)),
            isolation,
            clock,
            lock_path: paths.lock_file,
            workspace_dir: paths.workspace_dir,
            branch_prefix: config.isolation.branch_prefix.clone(),
            max_concurrent: coordinator.max_concurrent,
            default_criteria: coordinator.default_acceptance_criteria.clone(),
        }
    }

    /// Creates a coordinator backed by git worktrees and the system clock.
    ///
    /// A relative `root` is resolved against the current directory first, since git
    /// runs inside the root and would otherwise resolve workspace paths twice.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the current directory
    /// cannot be determined
    pub fn open(root: &Path, config: &ForemanConfig) -> Result<Self> {
        config.validate()?;
        let root = path::absolute(root)?;
        let isolation =
            GitWorktreeIsolation::new(root.clone(), config.isolation.main_branch.clone());
        Ok(Self::new(
            &root,
            config,
            Arc::new(isolation),
            Arc::new(SystemClock),
        ))
    }

    /// Configured concurrency cap.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Directory holding the per-task workspaces.
    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Time source shared with the staleness detector.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Adds a new `available` task and returns its id.
    ///
    /// # Errors
    /// Returns `InvalidPattern` for a bad files-in-scope glob, or a persistence error
    pub fn create_task(&self, new_task: NewTask) -> Result<TaskId> {
        if let Some(patterns) = &new_task.files_in_scope {
            for pattern in patterns {
                Pattern::new(pattern)
                    .map_err(|error| Error::InvalidPattern(format!("{pattern}: {error}")))?;
            }
        }

        let _lock = self.lock()?;
        let now = self.clock.now();
        let id = TaskId::generate(now.date_naive(), self.store.next_sequence()?);
        let task = new_task.into_task(id.clone(), now, &self.default_criteria);
        self.store.create(&task)?;

        info!(
            "Created task {id} ({}, role {}, priority {})",
            task.title, task.role, task.priority
        );
        Ok(id)
    }

    /// Claims `task_id` for `agent_id` and returns the new workspace path.
    ///
    /// Agent ids and roles must fit in one ledger cell. Preconditions are then
    /// checked in order: concurrency cap, existence, status. On failure nothing is
    /// mutated.
    ///
    /// # Errors
    /// Returns `InvalidInput`, `ConcurrencyExceeded`, `NotFound`, `InvalidState` or
    /// `IsolationFailure`
    pub fn claim(&self, task_id: &TaskId, agent_id: &str, role: &str) -> Result<PathBuf> {
        check_ledger_cell("agent id", agent_id)?;
        check_ledger_cell("role", role)?;
        let _lock = self.lock()?;

        let mut entries = self.ledger.list()?;
        if entries.len() >= self.max_concurrent {
            return Err(Error::ConcurrencyExceeded {
                limit: self.max_concurrent,
            });
        }

        let mut task = self
            .store
            .get(task_id)?
            .ok_or_else(|| Error::NotFound(task_id.clone()))?;
        if task.status != TaskStatus::Available {
            return Err(Error::InvalidState {
                task_id: task_id.clone(),
                expected: TaskStatus::Available,
                actual: task.status,
            });
        }
        if !task.accepts_role(role) {
            warn!(
                "Agent {agent_id} claims {task_id} as {role}, but the task asks for {}",
                task.role
            );
        }

        let workspace = self.workspace_dir.join(task_id.as_str());
        self.isolation
            .create(&self.branch_name(task_id), &workspace)?;

        let now = self.clock.now();
        task.mark_claimed(agent_id, now, workspace.clone());
        if let Err(error) = self.store.compare_and_swap(TaskStatus::Available, &task) {
            self.discard_workspace(&workspace);
            return Err(error);
        }

        entries.retain(|entry| &entry.task_id != task_id);
        entries.push(AssignmentRecord::new(
            task_id.clone(),
            agent_id,
            role,
            now,
            workspace.clone(),
        ));
        if let Err(error) = self.ledger.upsert_all(&entries) {
            task.mark_available();
            if let Err(rollback) = self.store.upsert(&task) {
                warn!("Failed to roll back claim of {task_id}: {rollback}");
            }
            self.discard_workspace(&workspace);
            return Err(error);
        }

        info!(
            "Agent {agent_id} claimed {task_id} ({}/{} active)",
            entries.len(),
            self.max_concurrent
        );
        Ok(workspace)
    }

    /// Finishes a claimed task.
    ///
    /// `Approved` merges the task branch and marks the task completed; `Rejected`
    /// returns it to the queue. A failed merge leaves the claim untouched so the call
    /// can be retried. Workspace removal afterwards is best-effort.
    ///
    /// # Errors
    /// Returns `NotFound`, `InvalidState`, or `IsolationFailure` when the merge fails
    pub fn complete(&self, task_id: &TaskId, verdict: Verdict, notes: &str) -> Result<()> {
        let _lock = self.lock()?;

        let mut task = self
            .store
            .get(task_id)?
            .ok_or_else(|| Error::NotFound(task_id.clone()))?;
        if task.status != TaskStatus::Claimed {
            return Err(Error::InvalidState {
                task_id: task_id.clone(),
                expected: TaskStatus::Claimed,
                actual: task.status,
            });
        }
        let workspace = task.workspace_path.clone();

        match verdict {
            Verdict::Approved => {
                let mut message = format!("Merge task {task_id}: {}", task.title);
                if !notes.is_empty() {
                    message.push_str("\n\n");
                    message.push_str(notes);
                }
                self.isolation.merge(&self.branch_name(task_id), &message)?;
                task.mark_completed(self.clock.now());
            }
            Verdict::Rejected => task.mark_available(),
        }
        self.store.compare_and_swap(TaskStatus::Claimed, &task)?;

        if let Some(path) = &workspace {
            self.discard_workspace(path);
        }
        self.remove_assignment(task_id)?;

        info!("Task {task_id} {verdict}, now {}", task.status);
        Ok(())
    }

    /// Picks the next available task, optionally only those open to `role`.
    ///
    /// The lowest priority rank wins; ties go to the task stored first.
    ///
    /// # Errors
    /// Returns an error if the task collection cannot be read
    pub fn get_next_task(&self, role: Option<&str>) -> Result<Option<Task>> {
        let role = role.filter(|wanted| !wanted.is_empty());
        let next = self
            .store
            .list(Some(TaskStatus::Available))?
            .into_iter()
            .filter(|task| role.is_none_or(|wanted| task.accepts_role(wanted)))
            .min_by_key(|task| task.priority.rank());
        Ok(next)
    }

    /// Unconditionally returns a task to the queue.
    ///
    /// Returns `Ok(false)` for unknown ids. Releasing a task that is already
    /// available with no ledger entry changes nothing.
    ///
    /// # Errors
    /// Returns `InvalidState` for completed tasks, or a persistence error
    pub fn force_release(&self, task_id: &TaskId, reason: &str) -> Result<bool> {
        let _lock = self.lock()?;

        let Some(mut task) = self.store.get(task_id)? else {
            debug!("Force release of unknown task {task_id}");
            return Ok(false);
        };
        if task.status == TaskStatus::Completed {
            return Err(Error::InvalidState {
                task_id: task_id.clone(),
                expected: TaskStatus::Claimed,
                actual: task.status,
            });
        }

        let mut entries = self.ledger.list()?;
        let entry = entries
            .iter()
            .position(|entry| &entry.task_id == task_id)
            .map(|index| entries.remove(index));
        if task.status == TaskStatus::Available && entry.is_none() {
            debug!("Task {task_id} is already available");
            return Ok(true);
        }

        let holder = task
            .claimed_by
            .clone()
            .or_else(|| entry.as_ref().map(|held| held.agent_id.clone()))
            .unwrap_or_else(|| "nobody".to_owned());
        self.decisions.append(&Decision {
            id: format!("FORCE-RELEASE-{task_id}"),
            timestamp: self.clock.now(),
            owner: DECISION_OWNER.to_owned(),
            decision: format!("Force-released task {task_id} held by {holder}"),
            rationale: reason.to_owned(),
        })?;

        let workspace = task
            .workspace_path
            .clone()
            .or_else(|| entry.as_ref().map(|held| held.workspace_path.clone()));
        if let Some(path) = &workspace {
            self.discard_workspace(path);
        }

        if task.status == TaskStatus::Claimed {
            task.mark_available();
            self.store.compare_and_swap(TaskStatus::Claimed, &task)?;
        }
        if entry.is_some() {
            self.ledger.upsert_all(&entries)?;
        }

        warn!("Force-released task {task_id} from {holder}: {reason}");
        Ok(true)
    }

    /// Looks up a task by id.
    ///
    /// # Errors
    /// Returns an error if the task collection cannot be read
    pub fn get_task(&self, task_id: &TaskId) -> Result<Option<Task>> {
        self.store.get(task_id)
    }

    /// Lists tasks in storage order, optionally filtered by status.
    ///
    /// # Errors
    /// Returns an error if the task collection cannot be read
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        self.store.list(status)
    }

    /// Active assignments, in ledger order.
    ///
    /// # Errors
    /// Returns an error if the ledger cannot be read
    pub fn assignments(&self) -> Result<Vec<AssignmentRecord>> {
        self.ledger.list()
    }

    /// Strictly validates the task collection and returns the number of tasks.
    ///
    /// # Errors
    /// Returns `PersistenceCorruption` for the first malformed record
    pub fn check_integrity(&self) -> Result<usize> {
        self.store.check_integrity()
    }

    /// Assignments that are old and show no recent workspace activity.
    ///
    /// # Errors
    /// Returns an error if the ledger cannot be read
    pub fn detect_stale(&self) -> Result<Vec<AssignmentRecord>> {
        Ok(self.detector.detect(&self.ledger.list()?))
    }

    /// Names of workspace directories with no ledger entry, sorted.
    ///
    /// # Errors
    /// Returns an error if the ledger or the workspace directory cannot be read
    pub fn orphaned_workspaces(&self) -> Result<Vec<String>> {
        if !self.workspace_dir.is_dir() {
            return Ok(Vec::new());
        }

        let active: HashSet<String> = self
            .ledger
            .list()?
            .iter()
            .filter_map(AssignmentRecord::workspace_name)
            .collect();

        let mut orphans = Vec::new();
        for dir_entry in fs::read_dir(&self.workspace_dir)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_dir() {
                continue;
            }
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if !active.contains(&name) {
                orphans.push(name);
            }
        }
        orphans.sort();
        Ok(orphans)
    }

    /// Deletes the orphaned workspace directory `name`.
    ///
    /// The provider is asked first; if the directory survives (for example because
    /// it is not a registered worktree) it is deleted directly. Returns whether a
    /// directory was removed. A workspace that gained a ledger entry in the meantime
    /// is left alone.
    ///
    /// # Errors
    /// Returns an error for names that are not a single path component, or when the
    /// directory cannot be deleted
    pub fn remove_orphaned_workspace(&self, name: &str) -> Result<bool> {
        let mut components = Path::new(name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(Error::Other(format!("Invalid workspace name '{name}'")));
        }

        let _lock = self.lock()?;
        let claimed = self
            .ledger
            .list()?
            .iter()
            .any(|entry| entry.workspace_name().as_deref() == Some(name));
        let path = self.workspace_dir.join(name);
        if claimed || !path.exists() {
            return Ok(false);
        }

        if let Err(error) = self.isolation.remove(&path) {
            debug!("Provider could not remove {path:?}, deleting directly: {error}");
        }
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }

        self.decisions.append(&Decision {
            id: format!("ORPHAN-CLEANUP-{name}"),
            timestamp: self.clock.now(),
            owner: DECISION_OWNER.to_owned(),
            decision: format!("Removed orphaned workspace {name}"),
            rationale: "Workspace directory has no matching assignment".to_owned(),
        })?;
        info!("Removed orphaned workspace {path:?}");
        Ok(true)
    }

    fn lock(&self) -> Result<StateLock> {
        StateLock::acquire(&self.lock_path)
    }

    fn branch_name(&self, task_id: &TaskId) -> String {
        format!("{}{task_id}", self.branch_prefix)
    }

    fn discard_workspace(&self, path: &Path) {
        if let Err(error) = self.isolation.remove(path) {
            warn!("Failed to remove workspace {path:?}: {error}");
        }
    }

    fn remove_assignment(&self, task_id: &TaskId) -> Result<()> {
        let mut entries = self.ledger.list()?;
        let before = entries.len();
        entries.retain(|entry| &entry.task_id != task_id);
        if entries.len() != before {
            self.ledger.upsert_all(&entries)?;
        }
        Ok(())
    }
}
