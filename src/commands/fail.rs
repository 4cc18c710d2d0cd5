use anyhow::Result;
use chrono::Utc;
use runqueue::task::{LogEntry, TaskStatus};
use std::path::Path;

use super::{build_controller, load_task};

/// Mark a task as failed, free its concurrency slot, and re-trigger admission
pub fn run(root: &Path, project_id: &str, task_id: &str, reason: Option<&str>) -> Result<()> {
    let (controller, supervisor) = build_controller(root)?;

    let mut task = load_task(controller.store().as_ref(), project_id, task_id)?;

    let now = Utc::now().to_rfc3339();
    task.status = TaskStatus::Error;
    task.completed_at = Some(now.clone());
    task.failure_reason = reason.map(|s| s.to_string());
    task.log.push(LogEntry {
        timestamp: now,
        actor: None,
        message: match reason {
            Some(reason) => format!("Failed: {}", reason),
            None => "Failed".to_string(),
        },
    });
    controller.store().upsert_task(&task)?;
    supervisor.remove(task_id)?;

    println!("Marked '{}' as failed", task_id);

    for admitted in controller.trigger_queue(project_id)? {
        println!("Admitted '{}'", admitted);
    }
    Ok(())
}
