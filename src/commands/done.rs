use anyhow::Result;
use chrono::Utc;
use runqueue::task::TaskStatus;
use std::path::Path;

use super::{build_controller, load_task};

/// Mark a task as done, free its concurrency slot, and re-trigger admission
pub fn run(root: &Path, project_id: &str, task_id: &str) -> Result<()> {
    let (controller, supervisor) = build_controller(root)?;

    let mut task = load_task(controller.store().as_ref(), project_id, task_id)?;
    if task.status == TaskStatus::Done {
        println!("Task '{}' is already done", task_id);
        return Ok(());
    }

    task.status = TaskStatus::Done;
    task.completed_at = Some(Utc::now().to_rfc3339());
    controller.store().upsert_task(&task)?;
    supervisor.remove(task_id)?;

    println!("Marked '{}' as done", task_id);

    for admitted in controller.trigger_queue(project_id)? {
        println!("Admitted '{}'", admitted);
    }
    Ok(())
}
