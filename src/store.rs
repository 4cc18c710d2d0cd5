//! Persistent task/project store
//!
//! Layout under the runqueue directory (default `.runqueue`):
//! - `projects/<project-id>/project.json` — project metadata + settings
//! - `projects/<project-id>/tasks.jsonl` — one task per line
//!
//! All writes are atomic via write-to-temp-then-rename, and the tasks file
//! is guarded by an flock-based lock so concurrent CLI invocations and the
//! queue controller do not interleave partial writes.

use crate::queue::QueueConfig;
use crate::task::Task;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error on line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Serialize(serde_json::Error),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),
}

/// Per-project settings blob. The queue configuration is stored under the
/// `queueConfig` key, matching the persisted layout hosts already use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProjectSettings {
    #[serde(rename = "queueConfig", skip_serializing_if = "Option::is_none")]
    pub queue_config: Option<QueueConfig>,
}

/// A project owning a set of tasks and a queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: ProjectSettings,
}

/// Store contract consumed by the queue controller and reconciliation loop.
///
/// Collaborators receive this as an explicit dependency rather than reaching
/// into module-level globals, so tests can substitute their own store.
pub trait TaskStore: Send + Sync {
    fn get_project(&self, project_id: &str) -> Result<Option<Project>, StoreError>;
    fn list_projects(&self) -> Result<Vec<Project>, StoreError>;
    fn update_project_settings(
        &self,
        project_id: &str,
        settings: &ProjectSettings,
    ) -> Result<(), StoreError>;
    /// All tasks for a project, in file order (not sorted)
    fn tasks(&self, project_id: &str) -> Result<Vec<Task>, StoreError>;
    /// Insert or replace a task by id
    fn upsert_task(&self, task: &Task) -> Result<(), StoreError>;
    /// Remove a task. Returns false if it did not exist.
    fn remove_task(&self, project_id: &str, task_id: &str) -> Result<bool, StoreError>;
    /// Acquire the cross-process queue lock for a project. Blocks until
    /// available; released when the returned guard drops.
    fn lock_project(&self, project_id: &str) -> Result<ProjectLock, StoreError>;
}

/// RAII guard for file locks - automatically releases lock on drop
struct FileLock {
    #[cfg(unix)]
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock on a lock file
    #[cfg(unix)]
    fn acquire<P: AsRef<Path>>(lock_path: P) -> Result<Self, StoreError> {
        if let Some(parent) = lock_path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        // Acquire exclusive lock (LOCK_EX) - blocks until available
        let fd = file.as_raw_fd();
        let ret = unsafe { libc::flock(fd, libc::LOCK_EX) };

        if ret != 0 {
            return Err(StoreError::Lock(format!(
                "Failed to acquire lock on {:?}: {}",
                lock_path.as_ref(),
                std::io::Error::last_os_error()
            )));
        }

        Ok(FileLock { file })
    }

    #[cfg(not(unix))]
    fn acquire<P: AsRef<Path>>(_lock_path: P) -> Result<Self, StoreError> {
        // No flock on non-Unix systems; single-process use only
        Ok(FileLock {})
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            // Release the lock (LOCK_UN) - best effort, ignore errors on drop
            let fd = self.file.as_raw_fd();
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }
        }
    }
}

/// Cross-process lock serializing queue mutations for one project.
///
/// Held across a whole admission or requeue read-modify-write sequence,
/// not just a single store operation, so concurrent CLI invocations
/// cannot interleave and over-admit. Lock files live under `locks/`,
/// separate from the per-file `.tasks.lock` the store takes internally.
pub struct ProjectLock {
    _guard: FileLock,
}

/// On-disk store rooted at the runqueue directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.projects_dir().join(project_id)
    }

    fn project_file(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("project.json")
    }

    fn tasks_file(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("tasks.jsonl")
    }

    fn lock_file(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join(".tasks.lock")
    }

    fn queue_lock_file(&self, project_id: &str) -> PathBuf {
        self.root.join("locks").join(format!("{}.lock", project_id))
    }

    /// Create a project, writing its metadata file. Errors if it exists.
    pub fn create_project(&self, project: &Project) -> Result<(), StoreError> {
        let dir = self.project_dir(&project.id);
        fs::create_dir_all(&dir)?;
        write_json_atomic(&self.project_file(&project.id), project)?;
        let tasks = self.tasks_file(&project.id);
        if !tasks.exists() {
            fs::write(&tasks, "")?;
        }
        Ok(())
    }

    fn load_tasks(&self, project_id: &str) -> Result<Vec<Task>, StoreError> {
        let path = self.tasks_file(project_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut tasks = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let task: Task = serde_json::from_str(&line)
                .map_err(|source| StoreError::Json { line: idx + 1, source })?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn save_tasks(&self, project_id: &str, tasks: &[Task]) -> Result<(), StoreError> {
        let dir = self.project_dir(project_id);
        fs::create_dir_all(&dir)?;
        let mut content = String::new();
        for task in tasks {
            content.push_str(&serde_json::to_string(task).map_err(StoreError::Serialize)?);
            content.push('\n');
        }
        write_atomic(&self.tasks_file(project_id), content.as_bytes())
    }
}

impl TaskStore for FileStore {
    fn get_project(&self, project_id: &str) -> Result<Option<Project>, StoreError> {
        let path = self.project_file(project_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let project =
            serde_json::from_str(&content).map_err(|source| StoreError::Json { line: 1, source })?;
        Ok(Some(project))
    }

    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let dir = self.projects_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut projects = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            if let Some(project) = self.get_project(&id)? {
                projects.push(project);
            }
        }
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(projects)
    }

    fn update_project_settings(
        &self,
        project_id: &str,
        settings: &ProjectSettings,
    ) -> Result<(), StoreError> {
        let mut project = self
            .get_project(project_id)?
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))?;
        project.settings = settings.clone();
        write_json_atomic(&self.project_file(project_id), &project)
    }

    fn tasks(&self, project_id: &str) -> Result<Vec<Task>, StoreError> {
        let _lock = FileLock::acquire(self.lock_file(project_id))?;
        self.load_tasks(project_id)
    }

    fn upsert_task(&self, task: &Task) -> Result<(), StoreError> {
        let _lock = FileLock::acquire(self.lock_file(&task.project_id))?;
        let mut tasks = self.load_tasks(&task.project_id)?;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task.clone(),
            None => tasks.push(task.clone()),
        }
        self.save_tasks(&task.project_id, &tasks)
    }

    fn remove_task(&self, project_id: &str, task_id: &str) -> Result<bool, StoreError> {
        let _lock = FileLock::acquire(self.lock_file(project_id))?;
        let mut tasks = self.load_tasks(project_id)?;
        let before = tasks.len();
        tasks.retain(|t| t.id != task_id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.save_tasks(project_id, &tasks)?;
        Ok(true)
    }

    fn lock_project(&self, project_id: &str) -> Result<ProjectLock, StoreError> {
        Ok(ProjectLock {
            _guard: FileLock::acquire(self.queue_lock_file(project_id))?,
        })
    }
}

/// Write bytes to a file atomically (temp file + fsync + rename)
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| {
        StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no parent directory for {:?}", path),
        ))
    })?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let temp_path = parent.join(format!(".{}.tmp", file_name));
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Serialize a value to pretty JSON and write it atomically
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;
    write_atomic(path, content.as_bytes())
}
