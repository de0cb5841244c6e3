use core::fmt;

use serde::{Deserialize, Serialize};

use crate::alerts::Severity;
use crate::metrics::{HealthMetrics, median};
use crate::report::HealthReport;

/// Reports needed before any baseline is trusted
pub const MIN_HISTORY: usize = 3;
/// Current median above `baseline * SPIKE_FACTOR` is a spike
const SPIKE_FACTOR: f64 = 1.5;
/// Current completion rate below `baseline * DROP_FACTOR` is a drop
const DROP_FACTOR: f64 = 0.7;

/// Kind of deviation from the historical baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Median cycle time rose sharply
    CycleTimeSpike,
    /// Completion rate fell sharply
    CompletionDrop,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::CycleTimeSpike => "cycle_time_spike",
            Self::CompletionDrop => "completion_drop",
        })
    }
}

/// A metric that deviates from its historical baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// What deviated
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    /// How serious the deviation is
    pub severity: Severity,
    /// Human-readable summary
    pub message: String,
    /// Historical reference value
    pub baseline: f64,
    /// Value in the current snapshot
    pub current: f64,
}

/// Compares `current` against the metrics of past reports.
///
/// Returns nothing until [`MIN_HISTORY`] reports exist.
pub fn detect_anomalies(current: &HealthMetrics, history: &[HealthReport]) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    if history.len() < MIN_HISTORY {
        return anomalies;
    }

    let mut past_medians: Vec<f64> = history
        .iter()
        .map(|report| report.metrics.median_cycle_time_seconds)
        .filter(|seconds| *seconds > 0.0)
        .collect();
    if !past_medians.is_empty() {
        past_medians.sort_by(f64::total_cmp);
        let baseline = median(&past_medians);
        let now = current.median_cycle_time_seconds;
        if now > baseline * SPIKE_FACTOR {
            anomalies.push(Anomaly {
                kind: AnomalyKind::CycleTimeSpike,
                severity: Severity::Warning,
                message: format!("Cycle time increased 50%: {baseline:.0}s -> {now:.0}s"),
                baseline,
                current: now,
            });
        }
    }

    let baseline = history
        .iter()
        .map(|report| report.metrics.completion_rate)
        .sum::<f64>()
        / history.len() as f64;
    let rate = current.completion_rate;
    if rate < baseline * DROP_FACTOR {
        anomalies.push(Anomaly {
            kind: AnomalyKind::CompletionDrop,
            severity: Severity::Warning,
            message: format!(
                "Completion rate dropped 30%: {:.1}% -> {:.1}%",
                baseline * 100.0,
                rate * 100.0
            ),
            baseline,
            current: rate,
        });
    }

    anomalies
}
