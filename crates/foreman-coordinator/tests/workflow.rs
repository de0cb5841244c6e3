//! End-to-end coordinator workflows against a directory-backed isolation provider.
#![cfg_attr(
    test,
    allow(
        clippy::tests_outside_test_module,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::missing_panics_doc,
        reason = "Test file allows"
    )
)]

use foreman_coordinator::{TaskCoordinator, WorkspaceIsolation};
use foreman_core::{
    Clock, Error, ForemanConfig, NewTask, Priority, Result, SystemClock, TaskId, TaskStatus,
    Verdict,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Plain directories instead of git worktrees.
struct DirIsolation;

impl WorkspaceIsolation for DirIsolation {
    fn create(&self, _branch: &str, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)?;
        Ok(())
    }

    fn merge(&self, _branch: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

fn open_coordinator(root: &Path) -> TaskCoordinator {
    TaskCoordinator::new(
        root,
        &ForemanConfig::default(),
        Arc::new(DirIsolation),
        Arc::new(SystemClock) as Arc<dyn Clock>,
    )
}

#[test]
fn test_claim_until_cap_then_complete() {
    let temp = TempDir::new().unwrap();
    let coordinator = open_coordinator(temp.path());

    let first = coordinator
        .create_task(NewTask::new("T1", "first").with_priority(Priority::High))
        .unwrap();
    coordinator.claim(&first, "agent-a", "any").unwrap();
    assert_eq!(coordinator.assignments().unwrap().len(), 1);

    let second = coordinator
        .create_task(NewTask::new("T2", "second").with_priority(Priority::Low))
        .unwrap();
    let next = coordinator.get_next_task(None).unwrap().unwrap();
    assert_eq!(next.id, second);

    let mut others: Vec<TaskId> = (0..6)
        .map(|index| {
            coordinator
                .create_task(NewTask::new(format!("extra {index}"), "filler"))
                .unwrap()
        })
        .collect();
    for (index, task_id) in others.drain(..5).enumerate() {
        coordinator
            .claim(&task_id, &format!("agent-{index}"), "any")
            .unwrap();
    }
    assert_eq!(coordinator.assignments().unwrap().len(), 6);

    let seventh = coordinator.claim(&second, "agent-late", "any");
    assert!(matches!(seventh, Err(Error::ConcurrencyExceeded { limit: 6 })));
    let leftover = coordinator.claim(&others[0], "agent-late", "any");
    assert!(matches!(leftover, Err(Error::ConcurrencyExceeded { .. })));
    assert_eq!(coordinator.assignments().unwrap().len(), 6);

    coordinator
        .complete(&first, Verdict::Approved, "shipped")
        .unwrap();
    assert_eq!(coordinator.assignments().unwrap().len(), 5);
    let completed = coordinator.get_task(&first).unwrap().unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);
    assert!(completed.completed_at.is_some());
}

#[test]
fn test_state_survives_reopening() {
    let temp = TempDir::new().unwrap();
    let task_id = {
        let coordinator = open_coordinator(temp.path());
        let task_id = coordinator
            .create_task(NewTask::new("persisted", "d"))
            .unwrap();
        coordinator.claim(&task_id, "agent", "any").unwrap();
        task_id
    };

    let reopened = open_coordinator(temp.path());
    let task = reopened.get_task(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Claimed);
    assert_eq!(reopened.assignments().unwrap()[0].task_id, task_id);

    let ledger = fs::read_to_string(temp.path().join("IN_PROGRESS.md")).unwrap();
    assert!(ledger.contains("**Max Concurrent: 6**"));
    assert!(ledger.contains(task_id.as_str()));
}

#[test]
fn test_concurrent_claims_of_one_task() {
    let temp = TempDir::new().unwrap();
    let task_id = open_coordinator(temp.path())
        .create_task(NewTask::new("contested", "d"))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|index| {
            let root = temp.path().to_path_buf();
            let target = task_id.clone();
            thread::spawn(move || {
                open_coordinator(&root)
                    .claim(&target, &format!("agent-{index}"), "any")
                    .is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(open_coordinator(temp.path()).assignments().unwrap().len(), 1);
}

#[test]
fn test_concurrent_claims_respect_cap() {
    let temp = TempDir::new().unwrap();
    let setup = open_coordinator(temp.path());
    let ids: Vec<TaskId> = (0..10)
        .map(|index| {
            setup
                .create_task(NewTask::new(format!("task {index}"), "d"))
                .unwrap()
        })
        .collect();

    let handles: Vec<_> = ids
        .into_iter()
        .enumerate()
        .map(|(index, target)| {
            let root = temp.path().to_path_buf();
            thread::spawn(move || {
                open_coordinator(&root)
                    .claim(&target, &format!("agent-{index}"), "any")
                    .is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(successes, 6);
    assert_eq!(setup.assignments().unwrap().len(), 6);
    assert_eq!(
        setup.list_tasks(Some(TaskStatus::Claimed)).unwrap().len(),
        6
    );
}
