//! Command handlers for CLI operations

use anyhow::Result;
use foreman_coordinator::TaskCoordinator;
use foreman_core::{Error, ForemanConfig, NewTask, TaskId};
use foreman_deps::serde_json::{json, to_string_pretty};
use foreman_deps::tracing::{info, warn};
use foreman_monitor::HealthMonitor;
use serde::Serialize;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Commands};

/// Writes `value` to stdout as pretty JSON.
///
/// # Errors
/// Returns an error if `value` cannot be serialized
pub fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = to_string_pretty(value)?;
    #[allow(clippy::print_stdout, reason = "Command output is JSON on stdout")]
    {
        println!("{text}");
    }
    Ok(())
}

const fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Runs the parsed command against the project under `--root`.
///
/// # Errors
/// Returns an error if the configuration cannot be loaded or the command fails
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let root = ForemanConfig::project_root(cli.root)?;
    let config = ForemanConfig::load_or_default(&root)?;
    let coordinator = TaskCoordinator::open(&root, &config)?;

    match cli.command {
        Commands::CreateTask {
            title,
            description,
            role,
            priority,
            files,
            criteria,
        } => {
            let mut new_task = NewTask::new(title, description)
                .with_role(role)
                .with_priority(priority);
            if !files.is_empty() {
                new_task = new_task.with_files_in_scope(files);
            }
            if !criteria.is_empty() {
                new_task = new_task.with_acceptance_criteria(criteria);
            }
            let task_id = coordinator.create_task(new_task)?;
            emit(&json!({ "task_id": task_id }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ClaimTask {
            task_id,
            agent_id,
            role,
        } => {
            let task_id = TaskId::from(task_id);
            let workspace = coordinator.claim(&task_id, &agent_id, &role)?;
            emit(&json!({
                "task_id": task_id,
                "agent_id": agent_id,
                "worktree_path": workspace,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::CompleteTask {
            task_id,
            verdict,
            notes,
        } => {
            let task_id = TaskId::from(task_id);
            coordinator.complete(&task_id, verdict, &notes)?;
            emit(&json!({ "task_id": task_id, "verdict": verdict }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::GetNextTask { role } => {
            let next = coordinator.get_next_task(role.as_deref())?;
            emit(&json!({ "task": next }))?;
            Ok(exit_code(next.is_some()))
        }
        Commands::ListTasks { status } => {
            emit(&coordinator.list_tasks(status)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ShowTask { task_id } => {
            let task_id = TaskId::from(task_id);
            let task = coordinator
                .get_task(&task_id)?
                .ok_or(Error::NotFound(task_id))?;
            emit(&task)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::DetectStale => {
            emit(&coordinator.detect_stale()?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckIntegrity => {
            let tasks = coordinator.check_integrity()?;
            emit(&json!({ "tasks": tasks }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ForceRelease { task_id, reason } => {
            let task_id = TaskId::from(task_id);
            let released = coordinator.force_release(&task_id, &reason)?;
            emit(&json!({ "task_id": task_id, "released": released }))?;
            Ok(exit_code(released))
        }
        Commands::Monitor { daemon, interval } => {
            let seconds = interval.unwrap_or(config.monitor.interval_seconds).max(1);
            let monitor = HealthMonitor::new(coordinator, &config, &root);
            if daemon {
                run_daemon(&monitor, Duration::from_secs(seconds)).await
            } else {
                run_once(&monitor)
            }
        }
    }
}

fn run_once(monitor: &HealthMonitor) -> Result<ExitCode> {
    let report = monitor.run_cycle()?;
    emit(&report)?;
    Ok(exit_code(monitor.is_healthy(&report)))
}

async fn run_daemon(monitor: &HealthMonitor, interval: Duration) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping after the current cycle");
                    cancel.cancel();
                }
                Err(error) => warn!("Could not listen for Ctrl-C: {error}"),
            }
        })
    };

    let cycles = monitor.run_daemon(interval, cancel).await;
    watcher.abort();

    emit(&json!({ "cycles": cycles }))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints a failed command as JSON, tagged with the error kind and whether a retry
/// may succeed when the error comes from the coordinator.
///
/// # Errors
/// Returns an error if the message cannot be serialized
pub fn emit_error(error: &anyhow::Error) -> Result<()> {
    let foreman_error = error.downcast_ref::<Error>();
    emit(&json!({
        "error": format!("{error:#}"),
        "kind": foreman_error.map(|known| known.kind().to_string()),
        "retryable": foreman_error.is_some_and(Error::is_retryable),
    }))
}
