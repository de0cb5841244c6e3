use core::fmt::Write as _;

use foreman_deps::chrono::SecondsFormat;

use crate::alerts::Severity;
use crate::report::HealthReport;

fn health_marker(score: f64) -> &'static str {
    if score > 0.8 {
        "OK"
    } else if score > 0.6 {
        "DEGRADED"
    } else {
        "CRITICAL"
    }
}

fn flag(ok: bool) -> &'static str {
    if ok { "ok" } else { "attention" }
}

fn hours(seconds: f64) -> f64 {
    seconds / 3600.0
}

/// Renders the human-readable summary of the latest cycle.
pub fn render_dashboard(report: &HealthReport, max_concurrent: usize) -> String {
    let metrics = &report.metrics;
    let utilization = metrics.workspace_utilization;
    let mut output = String::new();

    let _ignored = write!(
        output,
        "# Workflow Health Dashboard\n\n\
         **Last Updated:** {updated}\n\n\
         ## System Health: {score:.2} ({marker})\n\n\
         ### Key Metrics\n\
         - **Total Tasks:** {total}\n\
         - **Completed:** {completed} ({completion:.0}%)\n\
         - **Available:** {available}\n\
         - **In Progress:** {claimed} ({utilization_pct:.0}% utilization)\n\n\
         ### Performance\n\
         - **Median Cycle Time:** {median:.1} hours\n\
         - **P95 Cycle Time:** {p95:.1} hours\n\
         - **Queue Depth:** {queue} tasks\n\
         - **Active Agents:** {agents}/{max_concurrent}\n\n\
         ### Health Indicators\n\
         - **Stale Tasks:** {stale} ({stale_flag})\n\
         - **Orphaned Workspaces:** {orphans} ({orphan_flag})\n\
         - **Utilization:** {utilization_pct:.0}% ({utilization_flag})\n\n",
        updated = report.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        score = report.health_score,
        marker = health_marker(report.health_score),
        total = metrics.total_tasks,
        completed = metrics.completed_tasks,
        completion = metrics.completion_rate * 100.0,
        available = metrics.available_tasks,
        claimed = metrics.claimed_tasks,
        utilization_pct = utilization * 100.0,
        median = hours(metrics.median_cycle_time_seconds),
        p95 = hours(metrics.p95_cycle_time_seconds),
        queue = metrics.queue_depth,
        agents = metrics.active_agents,
        stale = metrics.stale_task_count,
        stale_flag = flag(metrics.stale_task_count == 0),
        orphans = metrics.orphaned_workspace_count,
        orphan_flag = flag(metrics.orphaned_workspace_count == 0),
        utilization_flag = flag((0.7..=0.9).contains(&utilization)),
    );

    output.push_str("### Active Alerts\n");
    if report.alerts.is_empty() {
        output.push_str("No alerts\n");
    }
    for alert in &report.alerts {
        let label = match alert.severity {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };
        let _ignored = writeln!(output, "- [{label}] **{}**: {}", alert.kind, alert.message);
    }

    let remediation = &report.remediation;
    if remediation.acted() || !remediation.failures.is_empty() {
        let _ignored = write!(
            output,
            "\n### Auto-Remediation\n\
             - **Stale tasks released:** {}\n\
             - **Orphaned workspaces removed:** {}\n",
            remediation.cleanup_stale_tasks, remediation.cleanup_orphaned_workspaces
        );
        for failure in &remediation.failures {
            let _ignored = writeln!(output, "- failed: {failure}");
        }
    }

    output.push_str("\n---\n*Generated by the Foreman health monitor*\n");
    output
}
