//! Core types for the Foreman task coordinator.
//!
//! This crate provides the task data model, the shared error type, configuration and
//! the clock abstraction used by the coordinator and the health monitor.

/// Assignment (ledger) records.
pub mod assignment;
/// Time source abstraction.
pub mod clock;
/// Workspace configuration.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Task data model.
pub mod task;

pub use assignment::{ASSIGNMENT_IN_PROGRESS, AssignmentRecord, check_ledger_cell};
pub use clock::{Clock, ManualClock, SystemClock, parse_timestamp};
pub use config::{
    CoordinatorConfig, ForemanConfig, IsolationConfig, MonitorConfig, PathsConfig,
};
pub use error::{Error, ErrorKind, Result};
pub use task::{ANY_ROLE, NewTask, Priority, Task, TaskId, TaskStatus, Verdict};
