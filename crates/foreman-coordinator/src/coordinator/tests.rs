//! Tests for the task coordinator

use super::*;
use crate::testing::InMemoryIsolation;
use foreman_core::{ManualClock, Priority};
use foreman_deps::chrono::{DateTime, Duration, TimeZone as _, Utc};
use tempfile::TempDir;

struct Fixture {
    temp: TempDir,
    isolation: Arc<InMemoryIsolation>,
    clock: Arc<ManualClock>,
    coordinator: TaskCoordinator,
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
}

fn fixture_with(config: &ForemanConfig) -> Fixture {
    let temp = TempDir::new().unwrap();
    let isolation = Arc::new(InMemoryIsolation::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let coordinator = TaskCoordinator::new(
        temp.path(),
        config,
        Arc::clone(&isolation) as Arc<dyn WorkspaceIsolation>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    Fixture {
        temp,
        isolation,
        clock,
        coordinator,
    }
}

fn fixture() -> Fixture {
    fixture_with(&ForemanConfig::default())
}

fn create(fixture: &Fixture, title: &str, priority: Priority) -> TaskId {
    fixture
        .coordinator
        .create_task(NewTask::new(title, "description").with_priority(priority))
        .unwrap()
}

#[test]
fn test_create_task_starts_available() {
    let fx = fixture();
    let id = create(&fx, "first", Priority::High);
    assert_eq!(id.as_str(), "TASK-20260310-0001");

    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Available);
    assert!(task.claimed_by.is_none());
    assert!(task.claimed_at.is_none());
    assert!(task.workspace_path.is_none());
    assert_eq!(task.created_at, start_time());
    assert_eq!(task.acceptance_criteria.len(), 3);

    let second = create(&fx, "second", Priority::Low);
    assert_eq!(second.as_str(), "TASK-20260310-0002");
}

#[test]
fn test_create_task_rejects_bad_glob() {
    let fx = fixture();
    let result = fx.coordinator.create_task(
        NewTask::new("globbed", "d").with_files_in_scope(vec!["src/[".to_owned()]),
    );
    assert!(matches!(result, Err(Error::InvalidPattern(_))));
    assert!(fx.coordinator.list_tasks(None).unwrap().is_empty());
}

#[test]
fn test_claim_creates_workspace_and_ledger_entry() {
    let fx = fixture();
    let id = create(&fx, "claim me", Priority::Medium);

    let workspace = fx.coordinator.claim(&id, "agent-a", "implementer").unwrap();
    assert_eq!(workspace, fx.temp.path().join("worktrees").join(id.as_str()));
    assert!(workspace.is_dir());
    assert_eq!(
        fx.isolation.created(),
        vec![(format!("task/{id}"), workspace.clone())]
    );

    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Claimed);
    assert_eq!(task.claimed_by.as_deref(), Some("agent-a"));
    assert_eq!(task.claimed_at, Some(start_time()));
    assert_eq!(task.workspace_path, Some(workspace));

    let entries = fx.coordinator.assignments().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].task_id, id);
    assert_eq!(entries[0].role, "implementer");
}

#[test]
fn test_second_claim_fails_with_invalid_state() {
    let fx = fixture();
    let id = create(&fx, "contested", Priority::Medium);
    fx.coordinator.claim(&id, "agent-a", "any").unwrap();

    let result = fx.coordinator.claim(&id, "agent-b", "any");
    assert!(matches!(
        result,
        Err(Error::InvalidState {
            expected: TaskStatus::Available,
            actual: TaskStatus::Claimed,
            ..
        })
    ));
    assert_eq!(fx.coordinator.assignments().unwrap().len(), 1);
}

#[test]
fn test_claim_unknown_task() {
    let fx = fixture();
    let result = fx.coordinator.claim(&TaskId::from("TASK-missing"), "agent", "any");
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(fx.isolation.created().is_empty());
}

#[test]
fn test_claim_at_cap_mutates_nothing() {
    let mut config = ForemanConfig::default();
    config.coordinator.max_concurrent = 2;
    let fx = fixture_with(&config);

    let first = create(&fx, "one", Priority::Medium);
    let second = create(&fx, "two", Priority::Medium);
    let third = create(&fx, "three", Priority::High);
    fx.coordinator.claim(&first, "a", "any").unwrap();
    fx.coordinator.claim(&second, "b", "any").unwrap();

    let result = fx.coordinator.claim(&third, "c", "any");
    assert!(matches!(result, Err(Error::ConcurrencyExceeded { limit: 2 })));
    assert_eq!(fx.coordinator.assignments().unwrap().len(), 2);
    assert_eq!(fx.isolation.created().len(), 2);

    let untouched = fx.coordinator.get_task(&third).unwrap().unwrap();
    assert_eq!(untouched.status, TaskStatus::Available);
}

#[test]
fn test_cap_is_checked_before_existence() {
    let mut config = ForemanConfig::default();
    config.coordinator.max_concurrent = 1;
    let fx = fixture_with(&config);
    let id = create(&fx, "one", Priority::Medium);
    fx.coordinator.claim(&id, "a", "any").unwrap();

    let result = fx.coordinator.claim(&TaskId::from("TASK-missing"), "b", "any");
    assert!(matches!(result, Err(Error::ConcurrencyExceeded { .. })));
}

#[test]
fn test_claim_rejects_values_that_break_the_ledger() {
    let fx = fixture();
    let id = create(&fx, "piped", Priority::Medium);

    for (agent, role) in [("team|agent-1", "any"), ("agent-1\n| x", "any"), ("a", "impl|x")] {
        let result = fx.coordinator.claim(&id, agent, role);
        assert!(matches!(result, Err(Error::InvalidInput(_))), "{agent:?} {role:?}");
    }

    assert!(fx.isolation.created().is_empty());
    assert!(fx.coordinator.assignments().unwrap().is_empty());
    assert!(fx.coordinator.orphaned_workspaces().unwrap().is_empty());
    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Available);

    fx.coordinator.claim(&id, "team-agent-1", "any").unwrap();
    assert_eq!(fx.coordinator.assignments().unwrap().len(), 1);
}

#[test]
fn test_isolation_failure_aborts_claim() {
    let fx = fixture();
    let id = create(&fx, "fragile", Priority::Medium);
    fx.isolation.fail_create(true);

    let result = fx.coordinator.claim(&id, "agent", "any");
    assert!(matches!(result, Err(Error::IsolationFailure(_))));

    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Available);
    assert!(fx.coordinator.assignments().unwrap().is_empty());
}

#[test]
fn test_complete_approved() {
    let fx = fixture();
    let id = create(&fx, "ship it", Priority::High);
    let workspace = fx.coordinator.claim(&id, "agent-a", "any").unwrap();
    fx.clock.advance(Duration::hours(3));

    fx.coordinator
        .complete(&id, Verdict::Approved, "all criteria met")
        .unwrap();

    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.completed_at, Some(start_time() + Duration::hours(3)));
    assert_eq!(task.claimed_by.as_deref(), Some("agent-a"));
    assert!(fx.coordinator.assignments().unwrap().is_empty());
    assert_eq!(fx.isolation.removal_attempts(), vec![workspace.clone()]);
    assert!(!workspace.exists());

    let merges = fx.isolation.merges();
    assert_eq!(merges.len(), 1);
    assert_eq!(merges[0].0, format!("task/{id}"));
    assert_eq!(
        merges[0].1,
        format!("Merge task {id}: ship it\n\nall criteria met")
    );
}

#[test]
fn test_complete_survives_removal_failure() {
    let fx = fixture();
    let id = create(&fx, "sticky workspace", Priority::Medium);
    let workspace = fx.coordinator.claim(&id, "agent", "any").unwrap();
    fx.isolation.fail_remove(true);

    fx.coordinator.complete(&id, Verdict::Approved, "").unwrap();

    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(fx.isolation.removal_attempts(), vec![workspace.clone()]);
    assert!(workspace.exists());
    assert!(fx.coordinator.assignments().unwrap().is_empty());
    assert_eq!(
        fx.coordinator.orphaned_workspaces().unwrap(),
        vec![id.as_str().to_owned()]
    );
}

#[test]
fn test_merge_failure_keeps_claim() {
    let fx = fixture();
    let id = create(&fx, "conflicting", Priority::Medium);
    fx.coordinator.claim(&id, "agent", "any").unwrap();
    fx.isolation.fail_merge(true);

    let result = fx.coordinator.complete(&id, Verdict::Approved, "");
    assert!(matches!(result, Err(Error::IsolationFailure(_))));

    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Claimed);
    assert_eq!(fx.coordinator.assignments().unwrap().len(), 1);
    assert!(fx.isolation.removal_attempts().is_empty());

    fx.isolation.fail_merge(false);
    fx.coordinator.complete(&id, Verdict::Approved, "").unwrap();
    let retried = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(retried.status, TaskStatus::Completed);
}

#[test]
fn test_complete_rejected_returns_task_to_queue() {
    let fx = fixture();
    let id = create(&fx, "needs work", Priority::Medium);
    fx.coordinator.claim(&id, "agent", "any").unwrap();

    fx.coordinator
        .complete(&id, Verdict::Rejected, "tests fail")
        .unwrap();

    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Available);
    assert!(task.claimed_by.is_none());
    assert!(task.claimed_at.is_none());
    assert!(task.workspace_path.is_none());
    assert!(task.completed_at.is_none());
    assert!(fx.coordinator.assignments().unwrap().is_empty());
    assert!(fx.isolation.merges().is_empty());

    fx.coordinator.claim(&id, "other-agent", "any").unwrap();
}

#[test]
fn test_complete_requires_claimed_task() {
    let fx = fixture();
    let id = create(&fx, "idle", Priority::Medium);

    let result = fx.coordinator.complete(&id, Verdict::Approved, "");
    assert!(matches!(result, Err(Error::InvalidState { .. })));

    let missing = fx
        .coordinator
        .complete(&TaskId::from("TASK-missing"), Verdict::Rejected, "");
    assert!(matches!(missing, Err(Error::NotFound(_))));
}

#[test]
fn test_get_next_task_orders_by_priority_then_storage() {
    let fx = fixture();
    let low = create(&fx, "low", Priority::Low);
    let first_medium = create(&fx, "medium one", Priority::Medium);
    create(&fx, "medium two", Priority::Medium);

    let next = fx.coordinator.get_next_task(None).unwrap().unwrap();
    assert_eq!(next.id, first_medium);

    let high = create(&fx, "high", Priority::High);
    let next_high = fx.coordinator.get_next_task(Some("")).unwrap().unwrap();
    assert_eq!(next_high.id, high);

    fx.coordinator.claim(&high, "agent", "any").unwrap();
    fx.coordinator.claim(&first_medium, "agent", "any").unwrap();
    let remaining = fx.coordinator.get_next_task(None).unwrap().unwrap();
    assert_eq!(remaining.title, "medium two");
    assert_ne!(remaining.id, low);
}

#[test]
fn test_get_next_task_role_filter() {
    let fx = fixture();
    let reviewer_only = fx
        .coordinator
        .create_task(
            NewTask::new("review", "d")
                .with_role("reviewer")
                .with_priority(Priority::High),
        )
        .unwrap();
    let open = create(&fx, "anyone", Priority::Low);

    let for_implementer = fx
        .coordinator
        .get_next_task(Some("implementer"))
        .unwrap()
        .unwrap();
    assert_eq!(for_implementer.id, open);

    let for_reviewer = fx
        .coordinator
        .get_next_task(Some("reviewer"))
        .unwrap()
        .unwrap();
    assert_eq!(for_reviewer.id, reviewer_only);

    fx.coordinator.claim(&open, "agent", "implementer").unwrap();
    assert!(
        fx.coordinator
            .get_next_task(Some("implementer"))
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_force_release_claimed_task() {
    let fx = fixture();
    let id = create(&fx, "stuck", Priority::Medium);
    let workspace = fx.coordinator.claim(&id, "agent-a", "any").unwrap();

    assert!(fx.coordinator.force_release(&id, "agent crashed").unwrap());

    let task = fx.coordinator.get_task(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Available);
    assert!(task.workspace_path.is_none());
    assert!(fx.coordinator.assignments().unwrap().is_empty());
    assert!(!workspace.exists());

    let log = fs::read_to_string(fx.temp.path().join("DECISIONS.md")).unwrap();
    assert!(log.contains(&format!("FORCE-RELEASE-{id}")));
    assert!(log.contains("**Rationale:** agent crashed"));
    assert!(log.contains("held by agent-a"));
}

#[test]
fn test_force_release_is_idempotent() {
    let fx = fixture();
    let id = create(&fx, "stuck", Priority::Medium);
    fx.coordinator.claim(&id, "agent", "any").unwrap();

    assert!(fx.coordinator.force_release(&id, "first").unwrap());
    let log_after_first = fs::read_to_string(fx.temp.path().join("DECISIONS.md")).unwrap();

    assert!(fx.coordinator.force_release(&id, "second").unwrap());
    let log_after_second = fs::read_to_string(fx.temp.path().join("DECISIONS.md")).unwrap();
    assert_eq!(log_after_first, log_after_second);
    assert_eq!(fx.isolation.removal_attempts().len(), 1);
}

#[test]
fn test_force_release_unknown_and_completed() {
    let fx = fixture();
    assert!(
        !fx.coordinator
            .force_release(&TaskId::from("TASK-missing"), "manual")
            .unwrap()
    );

    let id = create(&fx, "done", Priority::Medium);
    fx.coordinator.claim(&id, "agent", "any").unwrap();
    fx.coordinator.complete(&id, Verdict::Approved, "").unwrap();

    let result = fx.coordinator.force_release(&id, "manual");
    assert!(matches!(
        result,
        Err(Error::InvalidState {
            actual: TaskStatus::Completed,
            ..
        })
    ));
}

#[test]
fn test_detect_stale_uses_clock() {
    let fx = fixture();
    let id = create(&fx, "slow", Priority::Medium);
    fx.coordinator.claim(&id, "agent", "any").unwrap();

    fx.clock.advance(Duration::minutes(90));
    assert!(fx.coordinator.detect_stale().unwrap().is_empty());

    fx.clock.advance(Duration::minutes(60));
    let stale = fx.coordinator.detect_stale().unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].task_id, id);
}

#[test]
fn test_orphaned_workspaces_and_cleanup() {
    let fx = fixture();
    let id = create(&fx, "active", Priority::Medium);
    fx.coordinator.claim(&id, "agent", "any").unwrap();

    let ghost = fx.coordinator.workspace_dir().join("ghost");
    fs::create_dir_all(ghost.join("src")).unwrap();
    fs::write(fx.coordinator.workspace_dir().join("stray.txt"), "").unwrap();

    assert_eq!(
        fx.coordinator.orphaned_workspaces().unwrap(),
        vec!["ghost".to_owned()]
    );

    assert!(fx.coordinator.remove_orphaned_workspace("ghost").unwrap());
    assert!(!ghost.exists());
    assert!(fx.coordinator.orphaned_workspaces().unwrap().is_empty());
    assert!(!fx.coordinator.remove_orphaned_workspace("ghost").unwrap());

    assert!(!fx.coordinator.remove_orphaned_workspace(id.as_str()).unwrap());
    assert!(fx.coordinator.workspace_dir().join(id.as_str()).exists());

    assert!(fx.coordinator.remove_orphaned_workspace("../escape").is_err());

    let log = fs::read_to_string(fx.temp.path().join("DECISIONS.md")).unwrap();
    assert!(log.contains("ORPHAN-CLEANUP-ghost"));
}

#[test]
fn test_orphan_cleanup_falls_back_when_provider_fails() {
    let fx = fixture();
    let ghost = fx.coordinator.workspace_dir().join("leftover");
    fs::create_dir_all(&ghost).unwrap();
    fx.isolation.fail_remove(true);

    assert!(fx.coordinator.remove_orphaned_workspace("leftover").unwrap());
    assert!(!ghost.exists());
}

#[test]
fn test_ids_stay_unique_across_releases() {
    let fx = fixture();
    let first = create(&fx, "a", Priority::Medium);
    fx.coordinator.claim(&first, "agent", "any").unwrap();
    fx.coordinator.force_release(&first, "reset").unwrap();
    let second = create(&fx, "b", Priority::Medium);

    assert_ne!(first, second);
    assert_eq!(second.sequence(), Some(2));
    assert_eq!(fx.coordinator.check_integrity().unwrap(), 2);
}

#[test]
fn test_open_resolves_relative_root() {
    let coordinator =
        TaskCoordinator::open(Path::new("project"), &ForemanConfig::default()).unwrap();

    let workspace_dir = coordinator.workspace_dir();
    assert!(workspace_dir.is_absolute());
    assert!(workspace_dir.ends_with("project/worktrees"));
    assert_eq!(
        workspace_dir,
        std::env::current_dir().unwrap().join("project").join("worktrees")
    );
}
