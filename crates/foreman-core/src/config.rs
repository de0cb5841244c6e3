//! Configuration for the coordinator, its storage layout, workspace isolation and the
//! health monitor.

use crate::error::{Error, Result};
use foreman_deps::chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{self, Path, PathBuf};

/// Name of the config file at the project root.
pub const CONFIG_FILE_NAME: &str = "foreman.toml";

/// Environment variable overriding the project root.
pub const ROOT_ENV_VAR: &str = "FOREMAN_ROOT";

/// Complete Foreman configuration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForemanConfig {
    /// Task coordination rules
    pub coordinator: CoordinatorConfig,
    /// File layout under the project root
    pub paths: PathsConfig,
    /// Workspace isolation settings
    pub isolation: IsolationConfig,
    /// Health monitor settings
    pub monitor: MonitorConfig,
}

/// Task coordination rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum number of simultaneously claimed tasks
    pub max_concurrent: usize,
    /// Age after which a claim without recent activity is stale
    pub stale_threshold_minutes: i64,
    /// Window in which a workspace file change counts as activity
    pub recent_activity_minutes: i64,
    /// Criteria attached to tasks created without explicit ones
    pub default_acceptance_criteria: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 6,
            stale_threshold_minutes: 120,
            recent_activity_minutes: 30,
            default_acceptance_criteria: vec![
                "unit_tests pass".to_owned(),
                "integration_smoke pass".to_owned(),
                "reviewer approval".to_owned(),
            ],
        }
    }
}

impl CoordinatorConfig {
    /// Stale threshold as a duration.
    pub fn stale_threshold(&self) -> Duration {
        Duration::minutes(self.stale_threshold_minutes)
    }

    /// Recent-activity window as a duration.
    pub fn recent_window(&self) -> Duration {
        Duration::minutes(self.recent_activity_minutes)
    }
}

/// File layout, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Line-delimited JSON task collection
    pub tasks_file: PathBuf,
    /// Markdown table of active assignments
    pub ledger_file: PathBuf,
    /// Append-only decision log
    pub decisions_file: PathBuf,
    /// Directory holding one workspace per claimed task
    pub workspace_dir: PathBuf,
    /// Directory for health reports and the dashboard
    pub monitoring_dir: PathBuf,
    /// Lock file serializing coordinator mutations
    pub lock_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tasks_file: PathBuf::from("TASKS.jsonl"),
            ledger_file: PathBuf::from("IN_PROGRESS.md"),
            decisions_file: PathBuf::from("DECISIONS.md"),
            workspace_dir: PathBuf::from("worktrees"),
            monitoring_dir: PathBuf::from(".workflow/monitoring"),
            lock_file: PathBuf::from(".foreman.lock"),
        }
    }
}

impl PathsConfig {
    /// Returns a copy with every path resolved against `root`.
    #[must_use]
    pub fn resolve(&self, root: &Path) -> Self {
        Self {
            tasks_file: root.join(&self.tasks_file),
            ledger_file: root.join(&self.ledger_file),
            decisions_file: root.join(&self.decisions_file),
            workspace_dir: root.join(&self.workspace_dir),
            monitoring_dir: root.join(&self.monitoring_dir),
            lock_file: root.join(&self.lock_file),
        }
    }
}

/// Workspace isolation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Branch approved work is merged into
    pub main_branch: String,
    /// Prefix of per-task branches
    pub branch_prefix: String,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            main_branch: "main".to_owned(),
            branch_prefix: "task/".to_owned(),
        }
    }
}

/// Health monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between daemon cycles
    pub interval_seconds: u64,
    /// Number of past reports used as anomaly baseline
    pub history_limit: usize,
    /// Cycle time that earns a full cycle-time score
    pub ideal_cycle_time_hours: f64,
    /// Health below this raises a critical alert
    pub critical_health: f64,
    /// Stale count above this raises a cleanup alert
    pub stale_alert_threshold: usize,
    /// Queue depth above this raises an info alert
    pub queue_depth_alert: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600,
            history_limit: 20,
            ideal_cycle_time_hours: 4.0,
            critical_health: 0.6,
            stale_alert_threshold: 2,
            queue_depth_alert: 15,
        }
    }
}

impl ForemanConfig {
    /// Resolves the project root: explicit value, then `FOREMAN_ROOT`, then `.`.
    ///
    /// The result is absolute, so paths handed to subprocesses running in the root
    /// point at the same place as paths recorded in the stores.
    ///
    /// # Errors
    /// Returns an error if the current directory cannot be determined
    pub fn project_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
        let root = explicit.unwrap_or_else(|| {
            env::var(ROOT_ENV_VAR).map_or_else(|_| PathBuf::from("."), PathBuf::from)
        });
        Ok(path::absolute(root)?)
    }

    /// Loads `foreman.toml` from `root`, or the defaults when it does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read, parsed or validated
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            foreman_deps::tracing::debug!("No {CONFIG_FILE_NAME} in {root:?}, using defaults");
            Ok(Self::default())
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_from_file(path: &Path) -> Result<Self> {
        use foreman_deps::toml::from_str;
        let contents = fs::read_to_string(path)?;
        let config: Self = from_str(&contents)?;
        config.validate()?;

        foreman_deps::tracing::debug!(
            "Loaded config from {:?}: max_concurrent={}, stale_threshold_minutes={}",
            path,
            config.coordinator.max_concurrent,
            config.coordinator.stale_threshold_minutes
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        use foreman_deps::toml::to_string_pretty;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = to_string_pretty(self)?;
        let header = "# Foreman Configuration File\n\
                      # Edit this file to customize coordination and monitoring\n\n";

        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Checks values that would make the coordinator misbehave.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let coordinator = &self.coordinator;
        if coordinator.max_concurrent == 0 {
            return Err(Error::Config(
                "coordinator.max_concurrent must be at least 1".to_owned(),
            ));
        }
        if coordinator.recent_activity_minutes > coordinator.stale_threshold_minutes {
            return Err(Error::Config(
                "coordinator.recent_activity_minutes must not exceed stale_threshold_minutes"
                    .to_owned(),
            ));
        }
        if self.monitor.interval_seconds == 0 {
            return Err(Error::Config(
                "monitor.interval_seconds must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
