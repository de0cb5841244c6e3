//! Task coordination for agents sharing one codebase.
//!
//! This crate provides:
//!
//! - **Persistence**: the JSONL [`TaskStore`] and the markdown [`AssignmentLedger`],
//!   both rewritten atomically on every mutation
//! - **Isolation**: the [`WorkspaceIsolation`] seam and its git worktree implementation
//! - **Coordination**: the [`TaskCoordinator`] state machine (claim, complete, release)
//!   with a global concurrency cap
//! - **Staleness**: the [`StalenessDetector`] flagging claims with no recent activity
//!
//! # Example
//!
//! ```no_run
//! use foreman_coordinator::TaskCoordinator;
//! use foreman_core::{ForemanConfig, NewTask, Priority};
//! use std::path::Path;
//!
//! # fn example() -> foreman_core::Result<()> {
//! let root = Path::new(".");
//! let config = ForemanConfig::load_or_default(root)?;
//! let coordinator = TaskCoordinator::open(root, &config)?;
//!
//! let task_id = coordinator.create_task(
//!     NewTask::new("Add login", "Implement the login form").with_priority(Priority::High),
//! )?;
//! let _workspace = coordinator.claim(&task_id, "agent-1", "implementer")?;
//! # Ok(())
//! # }
//! ```

/// Task state machine
pub mod coordinator;
/// Append-only decision log
pub mod decisions;
/// Workspace isolation providers
pub mod isolation;
/// Cross-process state lock
pub mod lock;
/// Stale assignment detection
pub mod staleness;
/// Task and ledger persistence
pub mod store;
/// In-memory collaborators for tests
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use coordinator::TaskCoordinator;
pub use decisions::{Decision, DecisionLog};
pub use isolation::{GitWorktreeIsolation, WorkspaceIsolation};
pub use lock::StateLock;
pub use staleness::StalenessDetector;
pub use store::{AssignmentLedger, TaskStore};
