use core::fmt;

use foreman_core::MonitorConfig;
use foreman_deps::uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::anomaly::{Anomaly, AnomalyKind};
use crate::metrics::HealthMetrics;

/// Utilization below this with queued work raises an info alert
const LOW_UTILIZATION: f64 = 0.3;

/// How urgently an alert needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth knowing
    Info,
    /// Needs attention soon
    Warning,
    /// Needs attention now
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        })
    }
}

/// Corrective action the monitor may take on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    /// Force-release every stale assignment
    CleanupStaleTasks,
    /// Delete workspaces that have no assignment
    CleanupOrphanedWorkspaces,
}

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Health score below the critical threshold
    SystemHealthLow,
    /// Too many stale assignments
    StaleTasks,
    /// Workspaces without assignments
    OrphanedWorkspaces,
    /// Too much work waiting
    HighQueueDepth,
    /// Work waiting while workspaces sit idle
    LowUtilization,
    /// Cycle time spiked against history
    CycleTimeSpike,
    /// Completion rate dropped against history
    CompletionDrop,
    /// Coordinator state could not be read
    MetricsUnavailable,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::SystemHealthLow => "system_health_low",
            Self::StaleTasks => "stale_tasks",
            Self::OrphanedWorkspaces => "orphaned_workspaces",
            Self::HighQueueDepth => "high_queue_depth",
            Self::LowUtilization => "low_utilization",
            Self::CycleTimeSpike => "cycle_time_spike",
            Self::CompletionDrop => "completion_drop",
            Self::MetricsUnavailable => "metrics_unavailable",
        })
    }
}

impl From<AnomalyKind> for AlertKind {
    fn from(kind: AnomalyKind) -> Self {
        match kind {
            AnomalyKind::CycleTimeSpike => Self::CycleTimeSpike,
            AnomalyKind::CompletionDrop => Self::CompletionDrop,
        }
    }
}

/// A condition raised by one monitoring cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique id
    pub id: String,
    /// Urgency
    pub severity: Severity,
    /// Condition raised
    #[serde(rename = "type")]
    pub kind: AlertKind,
    /// Human-readable summary
    pub message: String,
    /// Suggested follow-up for a human
    pub recommendation: Option<String>,
    /// Action the monitor takes itself, if any
    pub auto_remediation: Option<RemediationAction>,
}

impl Alert {
    fn new(severity: Severity, kind: AlertKind, message: String) -> Self {
        Self {
            id: format!("alert-{kind}-{}", Uuid::new_v4().simple()),
            severity,
            kind,
            message,
            recommendation: None,
            auto_remediation: None,
        }
    }

    fn recommend(mut self, recommendation: &str) -> Self {
        self.recommendation = Some(recommendation.to_owned());
        self
    }

    fn remediate(mut self, action: RemediationAction) -> Self {
        self.auto_remediation = Some(action);
        self
    }
}

/// Critical alert for a cycle that could not collect its metrics.
pub fn metrics_unavailable_alert(reason: &str) -> Alert {
    Alert::new(
        Severity::Critical,
        AlertKind::MetricsUnavailable,
        format!("Metrics collection failed: {reason}"),
    )
    .recommend("Check the task collection, ledger and workspace directory for damage")
}

/// Applies the alert rules to one cycle's metrics, score and anomalies.
pub fn generate_alerts(
    metrics: &HealthMetrics,
    health: f64,
    anomalies: &[Anomaly],
    config: &MonitorConfig,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if health < config.critical_health {
        alerts.push(
            Alert::new(
                Severity::Critical,
                AlertKind::SystemHealthLow,
                format!("System health critically low: {health:.2}"),
            )
            .recommend("Review recent failures and agent performance"),
        );
    }

    if metrics.stale_task_count > config.stale_alert_threshold {
        alerts.push(
            Alert::new(
                Severity::Warning,
                AlertKind::StaleTasks,
                format!("{} stale tasks detected", metrics.stale_task_count),
            )
            .recommend("Auto-cleanup will run")
            .remediate(RemediationAction::CleanupStaleTasks),
        );
    }

    if metrics.orphaned_workspace_count > 0 {
        alerts.push(
            Alert::new(
                Severity::Info,
                AlertKind::OrphanedWorkspaces,
                format!(
                    "{} orphaned workspaces found",
                    metrics.orphaned_workspace_count
                ),
            )
            .recommend("Auto-cleanup will run")
            .remediate(RemediationAction::CleanupOrphanedWorkspaces),
        );
    }

    if metrics.queue_depth > config.queue_depth_alert {
        alerts.push(
            Alert::new(
                Severity::Info,
                AlertKind::HighQueueDepth,
                format!("Queue depth high: {} tasks waiting", metrics.queue_depth),
            )
            .recommend("Consider spawning more agents"),
        );
    }

    if metrics.workspace_utilization < LOW_UTILIZATION && metrics.queue_depth > 0 {
        alerts.push(
            Alert::new(
                Severity::Info,
                AlertKind::LowUtilization,
                format!(
                    "Low utilization ({:.0}%) with {} tasks available",
                    metrics.workspace_utilization * 100.0,
                    metrics.queue_depth
                ),
            )
            .recommend("Tasks may require specific roles; check task and agent role alignment"),
        );
    }

    alerts.extend(anomalies.iter().map(|anomaly| {
        Alert::new(anomaly.severity, anomaly.kind.into(), anomaly.message.clone())
    }));

    alerts
}
