//! Self-healing health monitor for the Foreman task coordinator.
//!
//! Each cycle snapshots coordinator state into [`HealthMetrics`], scores it, compares it
//! against earlier [`HealthReport`]s, raises [`Alert`]s and runs the safe cleanup actions
//! some alerts request. Reports are written as immutable JSON files next to a
//! regenerated markdown dashboard.

/// Alert rules and types.
pub mod alerts;
/// Deviation from historical baselines.
pub mod anomaly;
/// Markdown dashboard rendering.
pub mod dashboard;
/// Metric collection.
pub mod metrics;
/// Monitoring cycle and daemon loop.
pub mod monitor;
/// Automatic cleanup actions.
pub mod remediation;
/// Report persistence.
pub mod report;
/// Weighted health score.
pub mod score;

pub use alerts::{
    Alert, AlertKind, RemediationAction, Severity, generate_alerts, metrics_unavailable_alert,
};
pub use anomaly::{Anomaly, AnomalyKind, detect_anomalies};
pub use dashboard::render_dashboard;
pub use metrics::{HealthMetrics, collect_metrics};
pub use monitor::HealthMonitor;
pub use remediation::{RemediationOutcome, auto_remediate};
pub use report::{HealthReport, ReportStore};
pub use score::compute_health_score;
