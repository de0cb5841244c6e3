use std::collections::HashSet;

use foreman_coordinator::TaskCoordinator;
use foreman_core::{Result, TaskStatus};
use foreman_deps::chrono::{DateTime, Utc};
use foreman_deps::tracing::debug;
use serde::{Deserialize, Serialize};

/// Samples needed before the 95th percentile is computed instead of reusing the median
const MIN_P95_SAMPLES: usize = 21;

/// Snapshot of coordinator state taken at the start of a monitoring cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// All tasks
    pub total_tasks: usize,
    /// Tasks in `completed`
    pub completed_tasks: usize,
    /// Tasks in `available`
    pub available_tasks: usize,
    /// Tasks in `claimed`
    pub claimed_tasks: usize,
    /// `completed / total`, 0 without tasks
    pub completion_rate: f64,
    /// Median creation-to-completion time
    pub median_cycle_time_seconds: f64,
    /// 95th percentile of creation-to-completion time
    pub p95_cycle_time_seconds: f64,
    /// Assignments flagged by the staleness detector
    pub stale_task_count: usize,
    /// Tasks waiting to be claimed
    pub queue_depth: usize,
    /// `ledger size / concurrency cap`
    pub workspace_utilization: f64,
    /// Workspace directories without a ledger entry
    pub orphaned_workspace_count: usize,
    /// Distinct agents holding assignments
    pub active_agents: usize,
}

impl HealthMetrics {
    /// All-zero snapshot for a cycle that could not read the coordinator.
    pub fn unavailable(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            total_tasks: 0,
            completed_tasks: 0,
            available_tasks: 0,
            claimed_tasks: 0,
            completion_rate: 0.0,
            median_cycle_time_seconds: 0.0,
            p95_cycle_time_seconds: 0.0,
            stale_task_count: 0,
            queue_depth: 0,
            workspace_utilization: 0.0,
            orphaned_workspace_count: 0,
            active_agents: 0,
        }
    }
}

/// Aggregates the current metrics from `coordinator`.
///
/// # Errors
/// Returns an error if the task collection, the ledger or the workspace directory
/// cannot be read
pub fn collect_metrics(coordinator: &TaskCoordinator) -> Result<HealthMetrics> {
    let tasks = coordinator.list_tasks(None)?;
    let assignments = coordinator.assignments()?;

    let count = |status: TaskStatus| tasks.iter().filter(|task| task.status == status).count();
    let total_tasks = tasks.len();
    let completed_tasks = count(TaskStatus::Completed);
    let available_tasks = count(TaskStatus::Available);

    let mut cycle_times: Vec<f64> = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Completed)
        .filter_map(foreman_core::Task::cycle_time_seconds)
        .collect();
    cycle_times.sort_by(f64::total_cmp);

    let median_seconds = median(&cycle_times);
    let p95_seconds = if cycle_times.len() >= MIN_P95_SAMPLES {
        percentile_95(&cycle_times)
    } else {
        median_seconds
    };

    let active_agents = assignments
        .iter()
        .map(|assignment| assignment.agent_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let metrics = HealthMetrics {
        timestamp: coordinator.clock().now(),
        total_tasks,
        completed_tasks,
        available_tasks,
        claimed_tasks: count(TaskStatus::Claimed),
        completion_rate: if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64
        },
        median_cycle_time_seconds: median_seconds,
        p95_cycle_time_seconds: p95_seconds,
        stale_task_count: coordinator.detect_stale()?.len(),
        queue_depth: available_tasks,
        workspace_utilization: assignments.len() as f64 / coordinator.max_concurrent() as f64,
        orphaned_workspace_count: coordinator.orphaned_workspaces()?.len(),
        active_agents,
    };

    debug!(
        "Collected metrics: {} tasks, {} claimed, {} stale, {} orphaned",
        metrics.total_tasks,
        metrics.claimed_tasks,
        metrics.stale_task_count,
        metrics.orphaned_workspace_count
    );
    Ok(metrics)
}

/// Median of ascending `sorted`; 0 when empty.
pub(crate) fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len == 0 {
        return 0.0;
    }
    let middle = len / 2;
    if len % 2 == 1 {
        sorted[middle]
    } else {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    }
}

/// 19th of 20 cut points of ascending `sorted`, exclusive method.
///
/// Callers guarantee at least [`MIN_P95_SAMPLES`] values.
fn percentile_95(sorted: &[f64]) -> f64 {
    let samples = sorted.len() + 1;
    let scaled = 19 * samples;
    let index = scaled / 20;
    let delta = (scaled % 20) as f64;
    (sorted[index - 1] * (20.0 - delta) + sorted[index] * delta) / 20.0
}
