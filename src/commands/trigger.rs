use anyhow::Result;
use std::path::Path;

use super::build_controller;

/// Re-evaluate admission for a project. Safe to call at any time: when at
/// capacity, with an empty backlog, or with the queue disabled, this is a
/// no-op.
pub fn run(root: &Path, project_id: &str) -> Result<()> {
    let (controller, _) = build_controller(root)?;
    let admitted = controller.trigger_queue(project_id)?;

    if admitted.is_empty() {
        println!("Nothing to admit for '{}'", project_id);
    } else {
        for task_id in &admitted {
            println!("Admitted '{}'", task_id);
        }
    }
    Ok(())
}
