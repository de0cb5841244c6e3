use foreman_core::MonitorConfig;

use crate::metrics::HealthMetrics;

/// Completion rate that earns a full completion score
const TARGET_COMPLETION_RATE: f64 = 0.8;
/// Stale assignments at which the staleness score reaches zero
const STALE_LIMIT: f64 = 5.0;
/// Orphaned workspaces at which the orphan score reaches zero
const ORPHAN_LIMIT: f64 = 3.0;
/// Utilization band that earns a full utilization score
const UTILIZATION_BAND: (f64, f64) = (0.7, 0.9);

/// Weighted health score in `[0, 1]`.
///
/// | component   | weight |
/// |-------------|--------|
/// | completion  | 25     |
/// | cycle time  | 25     |
/// | staleness   | 20     |
/// | utilization | 15     |
/// | orphans     | 15     |
///
/// A system meeting every target scores exactly `1.0`.
pub fn compute_health_score(metrics: &HealthMetrics, config: &MonitorConfig) -> f64 {
    let completion = (metrics.completion_rate / TARGET_COMPLETION_RATE).min(1.0);

    let ideal_seconds = config.ideal_cycle_time_hours * 3600.0;
    let cycle_time = (ideal_seconds / metrics.median_cycle_time_seconds.max(1.0)).min(1.0);

    let staleness = (1.0 - metrics.stale_task_count as f64 / STALE_LIMIT).max(0.0);
    let utilization = utilization_score(metrics.workspace_utilization);
    let orphans = (1.0 - metrics.orphaned_workspace_count as f64 / ORPHAN_LIMIT).max(0.0);

    // Integer weights keep a perfect score at exactly 1.0.
    let weighted = 25.0 * completion
        + 25.0 * cycle_time
        + 20.0 * staleness
        + 15.0 * utilization
        + 15.0 * orphans;
    (weighted / 100.0).clamp(0.0, 1.0)
}

fn utilization_score(utilization: f64) -> f64 {
    let (low, high) = UTILIZATION_BAND;
    if utilization < low {
        (utilization / low).max(0.0)
    } else if utilization <= high {
        1.0
    } else {
        (1.0 - (utilization - high) / (1.0 - high)).max(0.0)
    }
}
