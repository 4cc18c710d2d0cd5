use anyhow::Result;
use runqueue::store::{FileStore, TaskStore};
use runqueue::task::sort_fifo;
use std::path::Path;

use super::ensure_initialized;

/// List a project's tasks in queue order
pub fn run(root: &Path, project_id: &str, json_output: bool) -> Result<()> {
    ensure_initialized(root)?;
    let store = FileStore::new(root);

    if store.get_project(project_id)?.is_none() {
        anyhow::bail!("Project '{}' not found", project_id);
    }

    let mut tasks = store.tasks(project_id)?;
    sort_fifo(&mut tasks);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks in project '{}'", project_id);
        return Ok(());
    }
    for task in &tasks {
        let status = serde_json::to_value(task.status)?;
        println!(
            "{:<14} {:<24} {}",
            status.as_str().unwrap_or("?"),
            task.id,
            task.title
        );
    }
    Ok(())
}
