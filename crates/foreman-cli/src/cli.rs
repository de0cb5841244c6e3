use clap::{Parser, Subcommand};
use foreman_core::{Priority, TaskStatus, Verdict};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "foreman")]
#[command(about = "Task coordination and health monitoring for parallel agents", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Project root (defaults to $FOREMAN_ROOT, then .)")]
    pub root: Option<PathBuf>,

    #[arg(long, global = true, help = "Append logs to this file instead of stderr")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Add a new available task")]
    CreateTask {
        #[arg(long, help = "Short title")]
        title: String,

        #[arg(long, help = "What needs to be done")]
        description: String,

        #[arg(long, default_value = "any", help = "Role allowed to claim the task")]
        role: String,

        #[arg(long, default_value = "medium", help = "high, medium or low")]
        priority: Priority,

        #[arg(long = "files", num_args = 1.., help = "Glob patterns the task may touch")]
        files: Vec<String>,

        #[arg(long = "criteria", num_args = 1.., help = "Acceptance criteria")]
        criteria: Vec<String>,
    },

    #[command(about = "Claim a task and create its isolated workspace")]
    ClaimTask {
        #[arg(long)]
        task_id: String,

        #[arg(long)]
        agent_id: String,

        #[arg(long)]
        role: String,
    },

    #[command(about = "Finish a claimed task with a review verdict")]
    CompleteTask {
        #[arg(long)]
        task_id: String,

        #[arg(long, help = "approved or rejected")]
        verdict: Verdict,

        #[arg(long, default_value = "", help = "Reviewer notes")]
        notes: String,
    },

    #[command(about = "Show the next task an agent should pick up")]
    GetNextTask {
        #[arg(long, help = "Only consider tasks open to this role")]
        role: Option<String>,
    },

    #[command(about = "List tasks")]
    ListTasks {
        #[arg(long, help = "available, claimed or completed")]
        status: Option<TaskStatus>,
    },

    #[command(about = "Show one task")]
    ShowTask {
        #[arg(long)]
        task_id: String,
    },

    #[command(about = "List assignments with no recent workspace activity")]
    DetectStale,

    #[command(about = "Strictly validate the task collection without repairing it")]
    CheckIntegrity,

    #[command(about = "Return a claimed task to the queue")]
    ForceRelease {
        #[arg(long)]
        task_id: String,

        #[arg(long, default_value = "manual", help = "Recorded in the decision log")]
        reason: String,
    },

    #[command(about = "Run a health check, or keep running them with --daemon")]
    Monitor {
        #[arg(long, help = "Keep running until interrupted")]
        daemon: bool,

        #[arg(long, help = "Seconds between cycles (defaults to monitor.interval_seconds)")]
        interval: Option<u64>,
    },
}
