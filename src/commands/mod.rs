pub mod add;
pub mod add_project;
pub mod done;
pub mod fail;
pub mod health_cmd;
pub mod init;
pub mod list;
pub mod queue_cmd;
pub mod reconcile_cmd;
pub mod recover;
pub mod status;
pub mod trigger;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use runqueue::config::Config;
use runqueue::launch::ShellLauncher;
use runqueue::queue::QueueController;
use runqueue::store::{FileStore, TaskStore};
use runqueue::supervisor::PidSupervisor;
use runqueue::task::Task;

/// Resolve the runqueue directory (default: .runqueue in current dir)
pub fn runqueue_dir(dir: &Option<PathBuf>) -> PathBuf {
    dir.clone().unwrap_or_else(|| PathBuf::from(".runqueue"))
}

/// Fail early when the runqueue directory has not been initialized
pub fn ensure_initialized(root: &Path) -> Result<()> {
    if !root.join("projects").is_dir() {
        anyhow::bail!("Runqueue not initialized. Run 'rq init' first.");
    }
    Ok(())
}

/// Wire up the controller with its production collaborators: the file
/// store, the pid-probing supervisor, and the shell launcher configured
/// from config.toml.
pub fn build_controller(root: &Path) -> Result<(QueueController, Arc<PidSupervisor>)> {
    ensure_initialized(root)?;
    let config = Config::load(root)?;
    let store = Arc::new(FileStore::new(root));
    let supervisor = Arc::new(PidSupervisor::new(root));
    let launcher = Arc::new(ShellLauncher::new(
        root,
        config.launcher,
        supervisor.clone(),
    ));
    let controller = QueueController::new(store, supervisor.clone(), launcher);
    Ok((controller, supervisor))
}

/// Load a single task or fail with a descriptive error
pub fn load_task(store: &dyn TaskStore, project_id: &str, task_id: &str) -> Result<Task> {
    store
        .tasks(project_id)?
        .into_iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| anyhow::anyhow!("Task '{}' not found in project '{}'", task_id, project_id))
}
