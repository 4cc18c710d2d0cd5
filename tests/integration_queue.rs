//! Integration tests for queue admission end to end:
//! controller + file store + supervisor/launcher doubles.

use runqueue::queue::{QueueController, QueueStatus};
use runqueue::reconcile::reconcile;
use runqueue::store::{FileStore, ProjectSettings, TaskStore};
use runqueue::task::TaskStatus;
use runqueue::test_helpers::{
    make_backlog_task, setup_store, FixedSupervisor, RecordingLauncher,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn build(
    dir: &std::path::Path,
) -> (QueueController, Arc<FileStore>, Arc<FixedSupervisor>, Arc<RecordingLauncher>) {
    let store = Arc::new(FileStore::new(dir));
    let supervisor = Arc::new(FixedSupervisor::new());
    let launcher = Arc::new(RecordingLauncher::new(supervisor.clone()));
    let controller = QueueController::new(store.clone(), supervisor.clone(), launcher.clone());
    (controller, store, supervisor, launcher)
}

#[test]
fn enabling_queue_admits_backlog_in_creation_order() {
    let dir = tempdir().unwrap();
    let (controller, _, _, launcher) = build(dir.path());
    setup_store(
        dir.path(),
        "p1",
        vec![
            make_backlog_task("p1", "second", 2),
            make_backlog_task("p1", "first", 1),
            make_backlog_task("p1", "third", 3),
        ],
    );

    // enabled: false -> true with maxConcurrent 2 admits exactly two, FIFO
    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 2}))
        .unwrap();

    assert_eq!(
        launcher.launched(),
        vec!["first".to_string(), "second".to_string()]
    );
    let status = controller.get_queue_status("p1");
    assert_eq!(status.running_count, 2);
    assert_eq!(status.backlog_count, 1);
}

#[test]
fn running_count_stays_bounded_through_lifecycle() {
    let dir = tempdir().unwrap();
    let (controller, store, supervisor, _) = build(dir.path());
    setup_store(
        dir.path(),
        "p1",
        (1..=6)
            .map(|i| make_backlog_task("p1", &format!("t{}", i), i))
            .collect(),
    );
    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 2}))
        .unwrap();

    // Complete tasks one by one; the invariant holds at every step
    for completed in ["t1", "t2", "t3", "t4"] {
        let status = controller.get_queue_status("p1");
        assert!(status.running_count <= status.max_concurrent as usize);

        supervisor.set_stopped(completed);
        let mut task = store
            .tasks("p1")
            .unwrap()
            .into_iter()
            .find(|t| t.id == completed)
            .unwrap();
        task.status = TaskStatus::Done;
        store.upsert_task(&task).unwrap();
        controller.trigger_queue("p1").unwrap();

        let status = controller.get_queue_status("p1");
        assert!(status.running_count <= status.max_concurrent as usize);
    }

    let status = controller.get_queue_status("p1");
    assert_eq!(status.running_count, 2);
    assert_eq!(status.backlog_count, 0);
}

#[test]
fn concurrent_triggers_admit_each_task_once() {
    let dir = tempdir().unwrap();
    let (controller, store, _, launcher) = build(dir.path());
    setup_store(dir.path(), "p1", vec![make_backlog_task("p1", "t1", 1)]);

    // Enable via settings directly so no admission happens before the race
    store
        .update_project_settings(
            "p1",
            &ProjectSettings {
                queue_config: Some(runqueue::queue::QueueConfig {
                    enabled: true,
                    max_concurrent: 1,
                }),
            },
        )
        .unwrap();

    let results = std::thread::scope(|s| {
        let a = s.spawn(|| controller.trigger_queue("p1").unwrap());
        let b = s.spawn(|| controller.trigger_queue("p1").unwrap());
        (a.join().unwrap(), b.join().unwrap())
    });

    // Exactly one of the two triggers wins the slot; the task is never
    // launched twice
    let total = results.0.len() + results.1.len();
    assert_eq!(total, 1, "admitted: {:?} / {:?}", results.0, results.1);
    assert_eq!(launcher.launched(), vec!["t1".to_string()]);

    let status = controller.get_queue_status("p1");
    assert_eq!(status.running_count, 1);
    assert_eq!(status.backlog_count, 0);
}

#[test]
fn trigger_twice_is_observably_identical() {
    let dir = tempdir().unwrap();
    let (controller, _, _, _) = build(dir.path());
    setup_store(
        dir.path(),
        "p1",
        vec![make_backlog_task("p1", "t1", 1), make_backlog_task("p1", "t2", 2)],
    );
    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 1}))
        .unwrap();

    controller.trigger_queue("p1").unwrap();
    let first = controller.get_queue_status("p1");
    controller.trigger_queue("p1").unwrap();
    let second = controller.get_queue_status("p1");
    assert_eq!(first, second);
}

#[test]
fn unknown_project_defaults_vs_errors_asymmetry() {
    // Reads default; writes and health checks error. This asymmetry is
    // deliberate and should not be silently normalized.
    let dir = tempdir().unwrap();
    let (controller, store, supervisor, _) = build(dir.path());

    let config = controller.get_queue_config("unknown-project");
    assert!(!config.enabled);
    assert_eq!(config.max_concurrent, 1);

    let status = controller.get_queue_status("unknown-project");
    assert_eq!(
        status,
        QueueStatus {
            enabled: false,
            max_concurrent: 1,
            running_count: 0,
            backlog_count: 0
        }
    );

    let err = controller
        .set_queue_config("unknown-project", &json!({"enabled": true, "maxConcurrent": 1}))
        .unwrap_err();
    assert_eq!(err.to_string(), "Project not found");

    let err = runqueue::reconcile::health_check(
        store.as_ref(),
        supervisor.as_ref(),
        "unknown-project",
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Project not found");
}

#[test]
fn crashed_task_rejoins_backlog_behind_waiting_tasks() {
    let dir = tempdir().unwrap();
    let (controller, store, supervisor, launcher) = build(dir.path());
    setup_store(
        dir.path(),
        "p1",
        vec![make_backlog_task("p1", "early", 1), make_backlog_task("p1", "late", 2)],
    );
    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 1}))
        .unwrap();
    assert_eq!(launcher.launched(), vec!["early".to_string()]);

    // The process for "early" dies without the task completing
    supervisor.set_stopped("early");

    let outcome = reconcile(&controller, "p1").unwrap();
    assert_eq!(outcome.requeued, vec!["early".to_string()]);
    // "late" was already waiting, so it wins the freed slot
    assert_eq!(outcome.admitted, vec!["late".to_string()]);

    // Once "late" finishes, "early" gets its turn
    supervisor.set_stopped("late");
    let mut late = store
        .tasks("p1")
        .unwrap()
        .into_iter()
        .find(|t| t.id == "late")
        .unwrap();
    late.status = TaskStatus::Done;
    store.upsert_task(&late).unwrap();

    let admitted = controller.trigger_queue("p1").unwrap();
    assert_eq!(admitted, vec!["early".to_string()]);
}

#[test]
fn raising_capacity_admits_in_same_call() {
    let dir = tempdir().unwrap();
    let (controller, _, _, launcher) = build(dir.path());
    setup_store(
        dir.path(),
        "p1",
        (1..=3)
            .map(|i| make_backlog_task("p1", &format!("t{}", i), i))
            .collect(),
    );
    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 1}))
        .unwrap();
    assert_eq!(launcher.launched().len(), 1);

    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 3}))
        .unwrap();
    assert_eq!(launcher.launched().len(), 3);
}

#[test]
fn lowering_capacity_does_not_kill_running_tasks() {
    let dir = tempdir().unwrap();
    let (controller, _, _, launcher) = build(dir.path());
    setup_store(
        dir.path(),
        "p1",
        (1..=3)
            .map(|i| make_backlog_task("p1", &format!("t{}", i), i))
            .collect(),
    );
    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 3}))
        .unwrap();
    assert_eq!(launcher.launched().len(), 3);

    // Shrinking the limit leaves existing runs alone; it only gates
    // future admission
    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 1}))
        .unwrap();
    let status = controller.get_queue_status("p1");
    assert_eq!(status.running_count, 3);

    let admitted = controller.trigger_queue("p1").unwrap();
    assert!(admitted.is_empty());
}

#[test]
fn disabling_queue_stops_admission() {
    let dir = tempdir().unwrap();
    let (controller, store, supervisor, launcher) = build(dir.path());
    setup_store(
        dir.path(),
        "p1",
        vec![make_backlog_task("p1", "t1", 1), make_backlog_task("p1", "t2", 2)],
    );
    controller
        .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 1}))
        .unwrap();
    controller
        .set_queue_config("p1", &json!({"enabled": false, "maxConcurrent": 1}))
        .unwrap();

    // t1 completes, but the disabled queue admits nothing new
    supervisor.set_stopped("t1");
    let mut t1 = store
        .tasks("p1")
        .unwrap()
        .into_iter()
        .find(|t| t.id == "t1")
        .unwrap();
    t1.status = TaskStatus::Done;
    store.upsert_task(&t1).unwrap();

    let admitted = controller.trigger_queue("p1").unwrap();
    assert!(admitted.is_empty());
    assert_eq!(launcher.launched(), vec!["t1".to_string()]);
}

#[test]
fn config_survives_controller_restart() {
    let dir = tempdir().unwrap();
    {
        let (controller, _, _, _) = build(dir.path());
        setup_store(dir.path(), "p1", vec![]);
        controller
            .set_queue_config("p1", &json!({"enabled": true, "maxConcurrent": 2}))
            .unwrap();
    }

    // Fresh controller over the same directory sees the persisted config
    let (controller, _, _, _) = build(dir.path());
    let config = controller.get_queue_config("p1");
    assert!(config.enabled);
    assert_eq!(config.max_concurrent, 2);

    // And the raw settings carry it under settings.queueConfig
    let store = FileStore::new(dir.path());
    let project = store.get_project("p1").unwrap().unwrap();
    assert_eq!(
        project.settings,
        ProjectSettings {
            queue_config: Some(runqueue::queue::QueueConfig {
                enabled: true,
                max_concurrent: 2
            })
        }
    );
}
