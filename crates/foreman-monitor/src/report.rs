use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use foreman_core::Result;
use foreman_deps::chrono::{DateTime, Utc};
use foreman_deps::serde_json::{from_str, to_string_pretty};
use foreman_deps::tracing::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::alerts::Alert;
use crate::anomaly::Anomaly;
use crate::metrics::HealthMetrics;
use crate::remediation::RemediationOutcome;

const REPORT_PREFIX: &str = "health-";
const ALERT_PREFIX: &str = "alert-";
const DASHBOARD_FILE: &str = "DASHBOARD.md";
const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%3f";
/// Length of a [`STAMP_FORMAT`] stamp, e.g. `20260402-100000-000`
const STAMP_LEN: usize = 19;

/// Everything one monitoring cycle observed and did. Never changed once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// End of the cycle
    pub timestamp: DateTime<Utc>,
    /// Snapshot the cycle worked from
    pub metrics: HealthMetrics,
    /// Weighted score in `[0, 1]`
    pub health_score: f64,
    /// Deviations from history
    pub anomalies: Vec<Anomaly>,
    /// Raised alerts
    pub alerts: Vec<Alert>,
    /// Remediation performed
    pub remediation: RemediationOutcome,
    /// Why metrics could not be collected; the metrics are placeholders when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_error: Option<String>,
}

#[derive(Serialize)]
struct AlertFile<'report> {
    timestamp: DateTime<Utc>,
    alerts: &'report [Alert],
}

/// Directory of immutable per-cycle reports plus the regenerated dashboard.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Creates a store writing into `dir` (created on first write).
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding the reports.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `report` to a new `health-<stamp>.json` file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn save(&self, report: &HealthReport) -> Result<PathBuf> {
        let contents = to_string_pretty(report)?;
        self.create_unique(REPORT_PREFIX, report.timestamp, &contents)
    }

    /// Writes the alerts of `report` to a new `alert-<stamp>.json` file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn save_alerts(&self, report: &HealthReport) -> Result<PathBuf> {
        let contents = to_string_pretty(&AlertFile {
            timestamp: report.timestamp,
            alerts: &report.alerts,
        })?;
        self.create_unique(ALERT_PREFIX, report.timestamp, &contents)
    }

    /// Loads the newest `limit` reports, oldest first, skipping unreadable ones.
    ///
    /// Reports are ordered by their file stamp, then by the collision suffix, so
    /// `health-<stamp>.json` comes before `health-<stamp>-1.json` and `-2` before `-10`.
    ///
    /// # Errors
    /// Returns an error if the directory exists but cannot be listed
    pub fn load_history(&self, limit: usize) -> Result<Vec<HealthReport>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| {
                name.starts_with(REPORT_PREFIX)
                    && Path::new(name)
                        .extension()
                        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
            })
            .collect();
        names.sort_by_cached_key(|name| history_key(name));
        let skip = names.len().saturating_sub(limit);

        let reports: Vec<HealthReport> = names
            .into_iter()
            .skip(skip)
            .filter_map(|name| {
                let path = self.dir.join(&name);
                let parsed = fs::read_to_string(&path)
                    .map_err(|error| error.to_string())
                    .and_then(|contents| {
                        from_str::<HealthReport>(&contents).map_err(|error| error.to_string())
                    });
                match parsed {
                    Ok(report) => Some(report),
                    Err(reason) => {
                        warn!("Skipping unreadable report {path:?}: {reason}");
                        None
                    }
                }
            })
            .collect();

        debug!("Loaded {} historical reports from {:?}", reports.len(), self.dir);
        Ok(reports)
    }

    /// Replaces `DASHBOARD.md` with `markdown`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn write_dashboard(&self, markdown: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(DASHBOARD_FILE);
        fs::write(&path, markdown)?;
        Ok(path)
    }

    /// Creates `<prefix><stamp>.json`, adding `-1`, `-2`, ... when the name is taken.
    fn create_unique(
        &self,
        prefix: &str,
        timestamp: DateTime<Utc>,
        contents: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let stamp = timestamp.format(STAMP_FORMAT).to_string();

        let mut attempt = 0_u32;
        loop {
            let name = if attempt == 0 {
                format!("{prefix}{stamp}.json")
            } else {
                format!("{prefix}{stamp}-{attempt}.json")
            };
            let path = self.dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(contents.as_bytes())?;
                    file.sync_all()?;
                    debug!("Wrote {path:?}");
                    return Ok(path);
                }
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(error) => return Err(error.into()),
            }
        }
    }
}

/// Sort key of a report file name: its stamp and its collision suffix.
fn history_key(name: &str) -> (String, u32) {
    let stem = name
        .strip_prefix(REPORT_PREFIX)
        .and_then(|rest| rest.strip_suffix(".json"))
        .unwrap_or(name);
    stem.split_at_checked(STAMP_LEN)
        .and_then(|(stamp, rest)| {
            let suffix = match rest {
                "" => 0,
                _ => rest.strip_prefix('-')?.parse().ok()?,
            };
            Some((stamp.to_owned(), suffix))
        })
        .unwrap_or_else(|| (stem.to_owned(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_deps::chrono::TimeZone as _;
    use tempfile::TempDir;

    fn report(at: DateTime<Utc>, completion_rate: f64) -> HealthReport {
        HealthReport {
            timestamp: at,
            metrics: HealthMetrics {
                timestamp: at,
                total_tasks: 2,
                completed_tasks: 1,
                available_tasks: 1,
                claimed_tasks: 0,
                completion_rate,
                median_cycle_time_seconds: 60.0,
                p95_cycle_time_seconds: 60.0,
                stale_task_count: 0,
                queue_depth: 1,
                workspace_utilization: 0.0,
                orphaned_workspace_count: 0,
                active_agents: 0,
            },
            health_score: 0.7,
            anomalies: Vec::new(),
            alerts: Vec::new(),
            remediation: RemediationOutcome::default(),
            metrics_error: None,
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_reports_never_overwrite() {
        let temp = TempDir::new().unwrap();
        let store = ReportStore::new(temp.path().join("monitoring"));

        let first = store.save(&report(at(0), 0.1)).unwrap();
        let second = store.save(&report(at(0), 0.2)).unwrap();
        assert_ne!(first, second);
        assert!(first.ends_with("health-20260402-100000-000.json"));
        assert!(second.ends_with("health-20260402-100000-000-1.json"));
        assert_eq!(store.load_history(10).unwrap().len(), 2);
    }

    #[test]
    fn test_history_keeps_newest_and_skips_garbage() {
        let temp = TempDir::new().unwrap();
        let store = ReportStore::new(temp.path().to_path_buf());
        for minute in 0..5 {
            store.save(&report(at(minute), f64::from(minute) / 10.0)).unwrap();
        }
        fs::write(temp.path().join("health-20260402-100500-000.json"), "{broken").unwrap();
        fs::write(temp.path().join("notes.json"), "{}").unwrap();

        let history = store.load_history(3).unwrap();
        let rates: Vec<f64> = history
            .iter()
            .map(|loaded| loaded.metrics.completion_rate)
            .collect();
        assert_eq!(rates, vec![0.3, 0.4]);
    }

    #[test]
    fn test_history_orders_collision_suffixes_numerically() {
        let temp = TempDir::new().unwrap();
        let store = ReportStore::new(temp.path().to_path_buf());
        for index in 0..12 {
            store.save(&report(at(0), f64::from(index))).unwrap();
        }
        store.save(&report(at(1), 100.0)).unwrap();

        let rates: Vec<f64> = store
            .load_history(20)
            .unwrap()
            .iter()
            .map(|loaded| loaded.metrics.completion_rate)
            .collect();
        let mut expected: Vec<f64> = (0..12).map(f64::from).collect();
        expected.push(100.0);
        assert_eq!(rates, expected);

        let newest: Vec<f64> = store
            .load_history(2)
            .unwrap()
            .iter()
            .map(|loaded| loaded.metrics.completion_rate)
            .collect();
        assert_eq!(newest, vec![11.0, 100.0]);
    }

    #[test]
    fn test_history_key_splits_stamp_and_suffix() {
        assert_eq!(
            history_key("health-20260402-100000-000.json"),
            ("20260402-100000-000".to_owned(), 0)
        );
        assert_eq!(
            history_key("health-20260402-100000-000-10.json"),
            ("20260402-100000-000".to_owned(), 10)
        );
        assert!(
            history_key("health-20260402-100000-000-2.json")
                < history_key("health-20260402-100000-000-10.json")
        );
    }

    #[test]
    fn test_missing_directory_has_no_history() {
        let temp = TempDir::new().unwrap();
        let store = ReportStore::new(temp.path().join("absent"));
        assert!(store.load_history(20).unwrap().is_empty());
    }

    #[test]
    fn test_alert_file_and_dashboard() {
        let temp = TempDir::new().unwrap();
        let store = ReportStore::new(temp.path().to_path_buf());

        let alerts = store.save_alerts(&report(at(1), 0.5)).unwrap();
        let contents = fs::read_to_string(&alerts).unwrap();
        assert!(contents.contains("\"alerts\": []"));

        store.write_dashboard("first").unwrap();
        let dashboard = store.write_dashboard("second").unwrap();
        assert_eq!(fs::read_to_string(dashboard).unwrap(), "second");
    }
}
