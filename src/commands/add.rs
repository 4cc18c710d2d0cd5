use anyhow::Result;
use chrono::Utc;
use runqueue::store::{FileStore, TaskStore};
use runqueue::task::Task;
use std::path::Path;

use super::ensure_initialized;

/// Add a new task to a project's backlog
pub fn run(
    root: &Path,
    project_id: &str,
    title: &str,
    id: Option<&str>,
    specs_path: Option<&str>,
) -> Result<()> {
    ensure_initialized(root)?;
    let store = FileStore::new(root);

    if store.get_project(project_id)?.is_none() {
        anyhow::bail!("Project '{}' not found", project_id);
    }

    let task_id = id
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("task-{}", Utc::now().timestamp_millis()));

    if store.tasks(project_id)?.iter().any(|t| t.id == task_id) {
        anyhow::bail!("Task '{}' already exists", task_id);
    }

    let task = Task {
        id: task_id.clone(),
        project_id: project_id.to_string(),
        title: title.to_string(),
        specs_path: specs_path.map(|s| s.to_string()),
        created_at: Some(Utc::now().to_rfc3339()),
        ..Task::default()
    };
    store.upsert_task(&task)?;

    println!("Added task '{}' to backlog of '{}'", task_id, project_id);
    Ok(())
}
