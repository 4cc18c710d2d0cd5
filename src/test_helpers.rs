//! Shared helpers and test doubles for unit and integration tests.
//!
//! Exposed behind the `test-support` feature so integration tests (which
//! link the crate as an external dependency) can use them too.

use crate::launch::{AgentLauncher, LaunchError};
use crate::store::{FileStore, Project, ProjectSettings};
use crate::supervisor::ProcessSupervisor;
use crate::task::Task;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Create a project with defaulted settings
pub fn make_project(id: &str) -> Project {
    Project {
        id: id.to_string(),
        name: Some(format!("Project {}", id)),
        settings: ProjectSettings::default(),
    }
}

/// Create a task with the given ids and all other fields defaulted
pub fn make_task(project_id: &str, id: &str) -> Task {
    Task {
        id: id.to_string(),
        project_id: project_id.to_string(),
        title: format!("Task {}", id),
        ..Task::default()
    }
}

/// Create a backlog task whose creation time encodes `order`, so FIFO
/// admission order in tests is explicit.
pub fn make_backlog_task(project_id: &str, id: &str, order: u32) -> Task {
    let mut task = make_task(project_id, id);
    task.created_at = Some(format!("2026-01-01T00:00:{:02}Z", order));
    task
}

/// Create a `FileStore` rooted at `root` with one project and its tasks
pub fn setup_store(root: &Path, project_id: &str, tasks: Vec<Task>) -> FileStore {
    let store = FileStore::new(root);
    store.create_project(&make_project(project_id)).unwrap();
    for task in tasks {
        crate::store::TaskStore::upsert_task(&store, &task).unwrap();
    }
    store
}

/// Supervisor double with an explicitly controlled running set
#[derive(Default)]
pub struct FixedSupervisor {
    running: Mutex<HashSet<String>>,
}

impl FixedSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, task_id: &str) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_id.to_string());
    }

    pub fn set_stopped(&self, task_id: &str) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(task_id);
    }
}

impl ProcessSupervisor for FixedSupervisor {
    fn is_running(&self, task_id: &str) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(task_id)
    }
}

/// Launcher double: records launched task ids and marks them running in
/// the paired `FixedSupervisor`. Individual tasks can be set to fail.
pub struct RecordingLauncher {
    supervisor: Arc<FixedSupervisor>,
    launched: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
    next_pid: AtomicU32,
}

impl RecordingLauncher {
    pub fn new(supervisor: Arc<FixedSupervisor>) -> Self {
        Self {
            supervisor,
            launched: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
            next_pid: AtomicU32::new(1000),
        }
    }

    /// Task ids launched so far, in launch order
    pub fn launched(&self) -> Vec<String> {
        self.launched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Make future launches of this task fail
    pub fn fail_for(&self, task_id: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_id.to_string());
    }
}

impl AgentLauncher for RecordingLauncher {
    fn launch(&self, task: &Task) -> Result<u32, LaunchError> {
        if self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&task.id)
        {
            return Err(LaunchError::Spawn {
                task_id: task.id.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "injected failure"),
            });
        }
        self.launched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task.id.clone());
        self.supervisor.set_running(&task.id);
        Ok(self.next_pid.fetch_add(1, Ordering::SeqCst))
    }
}
