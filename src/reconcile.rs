//! Reconciliation: cross-check persisted task state against live processes
//!
//! `health_check` is the project-wide sweep: it runs the health evaluator
//! over every task and returns only the unhealthy ones. `reconcile` goes
//! one step further and applies the explicit transition
//! `in_progress --[process missing]--> backlog`, re-queueing crashed runs
//! so their concurrency slot frees up without operator intervention, then
//! re-triggers admission.

use crate::health::{self, HealthIssue, RecoveryAction, SpecArtifacts};
use crate::queue::{QueueController, QueueError};
use crate::store::TaskStore;
use crate::supervisor::ProcessSupervisor;
use crate::task::{LogEntry, Task, TaskStatus};
use chrono::Utc;
use serde::Serialize;

/// Health report for a single unhealthy task
#[derive(Debug, Clone, Serialize)]
pub struct TaskHealth {
    pub task_id: String,
    pub issues: Vec<HealthIssue>,
    pub recovery_actions: Vec<RecoveryAction>,
}

/// Run the health evaluator over every task in a project.
///
/// Tasks with zero issues are omitted: an empty result means all healthy.
/// Unknown projects are an explicit error here, unlike the queue status
/// reads which default — project resolution for health checks is
/// authoritative. Per-task filesystem problems contribute evidence to the
/// evaluator instead of aborting the sweep.
pub fn health_check(
    store: &dyn TaskStore,
    supervisor: &dyn ProcessSupervisor,
    project_id: &str,
) -> Result<Vec<TaskHealth>, QueueError> {
    if store.get_project(project_id)?.is_none() {
        return Err(QueueError::ProjectNotFound);
    }

    let mut reports = Vec::new();
    for task in store.tasks(project_id)? {
        let artifacts = SpecArtifacts::probe_task(&task);
        let issues = health::evaluate(&task, supervisor.is_running(&task.id), &artifacts);
        if issues.is_empty() {
            continue;
        }
        let recovery_actions = health::recovery_actions(&issues);
        reports.push(TaskHealth {
            task_id: task.id,
            issues,
            recovery_actions,
        });
    }
    Ok(reports)
}

/// Result of a reconciliation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileOutcome {
    /// Tasks moved from in_progress back to backlog
    pub requeued: Vec<String>,
    /// Tasks admitted by the follow-up trigger
    pub admitted: Vec<String>,
}

/// Detect stuck tasks and re-queue them, then re-trigger admission.
///
/// A re-queued task gets a fresh `enqueued_at`, so it rejoins the backlog
/// behind already-waiting tasks instead of at its original position.
pub fn reconcile(
    controller: &QueueController,
    project_id: &str,
) -> Result<ReconcileOutcome, QueueError> {
    let store = controller.store();
    if store.get_project(project_id)?.is_none() {
        return Err(QueueError::ProjectNotFound);
    }

    // Requeue and re-admission happen under the same project lock so a
    // concurrent trigger cannot observe the intermediate state
    controller.with_project_lock(project_id, || {
        let mut outcome = ReconcileOutcome::default();
        for task in store.tasks(project_id)? {
            if task.status != TaskStatus::InProgress {
                continue;
            }
            if controller.supervisor().is_running(&task.id) {
                continue;
            }
            let mut task = task;
            requeue(&mut task, "Agent process missing; returned to backlog");
            store.upsert_task(&task)?;
            outcome.requeued.push(task.id);
        }

        let config = controller.get_queue_config(project_id);
        if config.enabled {
            outcome.admitted = controller.admit_locked(project_id, &config)?;
        }
        Ok(outcome)
    })
}

/// Re-admit a single stuck task into the queue (the `recover_stuck`
/// recovery action), then trigger admission.
pub fn recover_stuck(
    controller: &QueueController,
    project_id: &str,
    task_id: &str,
) -> Result<ReconcileOutcome, QueueError> {
    let store = controller.store();
    if store.get_project(project_id)?.is_none() {
        return Err(QueueError::ProjectNotFound);
    }

    controller.with_project_lock(project_id, || {
        let mut task = find_task(store.as_ref(), project_id, task_id)?;

        if task.status != TaskStatus::InProgress {
            return Err(QueueError::RecoveryRejected {
                task_id: task_id.to_string(),
                reason: format!("status is {:?}, not in_progress", task.status),
            });
        }
        if controller.supervisor().is_running(task_id) {
            return Err(QueueError::RecoveryRejected {
                task_id: task_id.to_string(),
                reason: "agent process is still running".to_string(),
            });
        }

        requeue(&mut task, "Recovered stuck task; returned to backlog");
        store.upsert_task(&task)?;

        let config = controller.get_queue_config(project_id);
        let admitted = if config.enabled {
            controller.admit_locked(project_id, &config)?
        } else {
            Vec::new()
        };
        Ok(ReconcileOutcome {
            requeued: vec![task_id.to_string()],
            admitted,
        })
    })
}

/// Remove a task from the store (the `discard_task` recovery action)
pub fn discard_task(
    controller: &QueueController,
    project_id: &str,
    task_id: &str,
) -> Result<(), QueueError> {
    let store = controller.store();
    if store.get_project(project_id)?.is_none() {
        return Err(QueueError::ProjectNotFound);
    }
    controller.with_project_lock(project_id, || {
        if !store.remove_task(project_id, task_id)? {
            return Err(QueueError::TaskNotFound(task_id.to_string()));
        }
        Ok(())
    })
}

fn find_task(
    store: &dyn TaskStore,
    project_id: &str,
    task_id: &str,
) -> Result<Task, QueueError> {
    store
        .tasks(project_id)?
        .into_iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))
}

/// The `running --[process missing]--> backlog` transition
fn requeue(task: &mut Task, message: &str) {
    let now = Utc::now().to_rfc3339();
    task.status = TaskStatus::Backlog;
    task.enqueued_at = Some(now.clone());
    task.execution_progress = None;
    task.log.push(LogEntry {
        timestamp: now,
        actor: None,
        message: message.to_string(),
    });
}
