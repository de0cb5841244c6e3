use std::path::{Path, PathBuf};
use std::time::Duration;

use foreman_coordinator::TaskCoordinator;
use foreman_core::{Error, ForemanConfig, MonitorConfig, Result};
use foreman_deps::tracing::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::alerts::{generate_alerts, metrics_unavailable_alert};
use crate::anomaly::detect_anomalies;
use crate::dashboard::render_dashboard;
use crate::metrics::{HealthMetrics, collect_metrics};
use crate::remediation::{RemediationOutcome, auto_remediate};
use crate::report::{HealthReport, ReportStore};
use crate::score::compute_health_score;

/// Periodic health checks over one coordinator.
pub struct HealthMonitor {
    coordinator: TaskCoordinator,
    config: MonitorConfig,
    reports: ReportStore,
}

impl HealthMonitor {
    /// Creates a monitor writing reports into the configured monitoring directory
    /// under `root`.
    pub fn new(coordinator: TaskCoordinator, config: &ForemanConfig, root: &Path) -> Self {
        let paths = config.paths.resolve(root);
        Self {
            coordinator,
            config: config.monitor.clone(),
            reports: ReportStore::new(paths.monitoring_dir),
        }
    }

    /// Coordinator being monitored.
    pub fn coordinator(&self) -> &TaskCoordinator {
        &self.coordinator
    }

    /// Report directory.
    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }

    /// Runs one full cycle: metrics, score, anomalies, alerts, remediation, report.
    ///
    /// History is loaded before the new report is written, so a cycle never compares
    /// against itself. Remediation failures end up in the report, not in the result.
    /// When metrics cannot be collected the cycle still records a zero-score report
    /// carrying a `metrics_unavailable` alert, and skips remediation.
    ///
    /// # Errors
    /// Returns an error if the report cannot be written
    pub fn run_cycle(&self) -> Result<HealthReport> {
        let metrics = match collect_metrics(&self.coordinator) {
            Ok(metrics) => metrics,
            Err(error) => return self.record_unavailable(&error),
        };
        let health_score = compute_health_score(&metrics, &self.config);

        let mut history = self
            .reports
            .load_history(self.config.history_limit)
            .unwrap_or_else(|error| {
                warn!("Could not load report history: {error}");
                Vec::new()
            });
        history.retain(|past| past.metrics_error.is_none());
        let anomalies = detect_anomalies(&metrics, &history);
        let alerts = generate_alerts(&metrics, health_score, &anomalies, &self.config);
        let remediation = auto_remediate(&self.coordinator, &alerts);

        let report = HealthReport {
            timestamp: self.coordinator.clock().now(),
            metrics,
            health_score,
            anomalies,
            alerts,
            remediation,
            metrics_error: None,
        };

        let path = self.persist(&report)?;
        info!(
            "Health {:.2}: {} alerts, {} stale released, {} orphans removed ({})",
            report.health_score,
            report.alerts.len(),
            report.remediation.cleanup_stale_tasks,
            report.remediation.cleanup_orphaned_workspaces,
            path.display()
        );
        Ok(report)
    }

    fn record_unavailable(&self, error: &Error) -> Result<HealthReport> {
        warn!("Could not collect metrics: {error}");
        let now = self.coordinator.clock().now();
        let reason = error.to_string();

        let report = HealthReport {
            timestamp: now,
            metrics: HealthMetrics::unavailable(now),
            health_score: 0.0,
            anomalies: Vec::new(),
            alerts: vec![metrics_unavailable_alert(&reason)],
            remediation: RemediationOutcome::default(),
            metrics_error: Some(reason),
        };

        let path = self.persist(&report)?;
        warn!("Recorded degraded health report {}", path.display());
        Ok(report)
    }

    fn persist(&self, report: &HealthReport) -> Result<PathBuf> {
        let path = self.reports.save(report)?;
        if !report.alerts.is_empty() {
            self.reports.save_alerts(report)?;
        }
        self.reports
            .write_dashboard(&render_dashboard(report, self.coordinator.max_concurrent()))?;
        Ok(path)
    }

    /// Whether `report` clears the critical health threshold.
    pub fn is_healthy(&self, report: &HealthReport) -> bool {
        report.health_score > self.config.critical_health
    }

    /// Runs a cycle immediately and then every `interval` until `cancel` fires.
    ///
    /// A failed cycle is logged and the loop keeps going. Returns the number of
    /// cycles that completed.
    pub async fn run_daemon(&self, interval: Duration, cancel: CancellationToken) -> usize {
        info!("Health monitor started, interval {}s", interval.as_secs());
        let mut completed = 0_usize;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_cycle() {
                Ok(_) => completed += 1,
                Err(error) => warn!("Monitoring cycle failed: {error}"),
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }

        info!("Health monitor stopped after {completed} cycles");
        completed
    }
}
