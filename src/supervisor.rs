//! Process supervisor
//!
//! Tracks which task IDs currently have a live agent process attached.
//! The scheduler depends on exactly one capability here: the `is_running`
//! membership query. Spawn/kill machinery lives with the launcher; this
//! module only records and probes.
//!
//! The run registry lives at `supervisor/registry.json` and is written
//! atomically (write-to-temp-then-rename), in the same way the task store
//! persists its files.

use crate::store::{write_json_atomic, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Point-in-time membership check against currently live agent processes.
///
/// This is the full contract the queue controller and reconciliation loop
/// consume; everything else on the concrete types is host plumbing.
pub trait ProcessSupervisor: Send + Sync {
    fn is_running(&self, task_id: &str) -> bool;
}

/// Entry for a single agent run in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEntry {
    /// Unique run ID (e.g., "run-7")
    pub run_id: String,
    /// Process ID of the agent
    pub pid: u32,
    /// Task the agent is working on
    pub task_id: String,
    /// When the run was started (ISO 8601)
    pub started_at: String,
    /// Path to the run's output log file
    pub output_file: String,
}

impl RunEntry {
    /// Calculate uptime in seconds from started_at to now
    pub fn uptime_secs(&self) -> Option<i64> {
        let started = DateTime::parse_from_rfc3339(&self.started_at).ok()?;
        let now = Utc::now();
        Some((now - started.with_timezone(&Utc)).num_seconds())
    }

    /// Format uptime as human-readable string (e.g., "5m", "2h", "1d")
    pub fn uptime_human(&self) -> String {
        match self.uptime_secs() {
            Some(secs) if secs < 60 => format!("{}s", secs),
            Some(secs) if secs < 3600 => format!("{}m", secs / 60),
            Some(secs) if secs < 86400 => format!("{}h", secs / 3600),
            Some(secs) => format!("{}d", secs / 86400),
            None => "unknown".to_string(),
        }
    }
}

/// The run registry - tracks the agent process attached to each task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRegistry {
    /// Map of task ID to run entry
    pub runs: HashMap<String, RunEntry>,
    /// Next run ID to assign
    pub next_run_id: u32,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self {
            runs: HashMap::new(),
            next_run_id: 1,
        }
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the path to the registry file
    pub fn registry_path(root: &Path) -> PathBuf {
        root.join("supervisor").join("registry.json")
    }

    /// Load registry from disk, creating a new one if it doesn't exist
    pub fn load(root: &Path) -> Result<Self, StoreError> {
        let path = Self::registry_path(root);
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(&path)?;
        let registry: RunRegistry = serde_json::from_str(&content)
            .map_err(|source| StoreError::Json { line: 1, source })?;
        Ok(registry)
    }

    /// Save registry to disk atomically
    pub fn save(&self, root: &Path) -> Result<(), StoreError> {
        write_json_atomic(&Self::registry_path(root), self)
    }

    /// Record a new run for a task, assigning the next run ID.
    /// Replaces any previous entry for the same task.
    pub fn register(&mut self, task_id: &str, pid: u32, output_file: &str) -> String {
        let run_id = format!("run-{}", self.next_run_id);
        self.next_run_id += 1;
        self.runs.insert(
            task_id.to_string(),
            RunEntry {
                run_id: run_id.clone(),
                pid,
                task_id: task_id.to_string(),
                started_at: Utc::now().to_rfc3339(),
                output_file: output_file.to_string(),
            },
        );
        run_id
    }

    /// Remove the run entry for a task. Returns the removed entry if any.
    pub fn remove(&mut self, task_id: &str) -> Option<RunEntry> {
        self.runs.remove(task_id)
    }

    /// Drop entries whose process is no longer alive.
    /// Returns the task IDs that were pruned.
    pub fn cleanup_dead(&mut self) -> Vec<String> {
        let dead: Vec<String> = self
            .runs
            .iter()
            .filter(|(_, entry)| !is_process_alive(entry.pid))
            .map(|(task_id, _)| task_id.clone())
            .collect();
        for task_id in &dead {
            self.runs.remove(task_id);
        }
        dead
    }
}

/// Check if a process with the given PID is alive.
///
/// Uses `kill(pid, 0)` on Unix to probe without sending a signal.
/// On non-Unix platforms, conservatively assumes the process is alive.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    true
}

/// Supervisor backed by the on-disk run registry plus a PID liveness probe.
///
/// A task counts as running only when the registry has an entry for it AND
/// the recorded process is still alive. A registry entry with a dead pid is
/// exactly the "stuck" evidence the health evaluator looks for.
pub struct PidSupervisor {
    root: PathBuf,
    // Serializes registry read-modify-write within this process; the
    // on-disk file is shared, so cross-process writers still go through
    // atomic rename.
    write_lock: Mutex<()>,
}

impl PidSupervisor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The registry entry for a task, if one exists (alive or not)
    pub fn entry(&self, task_id: &str) -> Option<RunEntry> {
        RunRegistry::load(&self.root)
            .ok()
            .and_then(|r| r.runs.get(task_id).cloned())
    }

    /// Record a spawned process for a task
    pub fn register(&self, task_id: &str, pid: u32, output_file: &str) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut registry = RunRegistry::load(&self.root)?;
        let run_id = registry.register(task_id, pid, output_file);
        registry.save(&self.root)?;
        Ok(run_id)
    }

    /// Drop the registry entry for a task (run finished or was discarded)
    pub fn remove(&self, task_id: &str) -> Result<Option<RunEntry>, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut registry = RunRegistry::load(&self.root)?;
        let removed = registry.remove(task_id);
        if removed.is_some() {
            registry.save(&self.root)?;
        }
        Ok(removed)
    }

    /// Prune entries for dead processes, returning the affected task IDs
    pub fn cleanup_dead(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut registry = RunRegistry::load(&self.root)?;
        let dead = registry.cleanup_dead();
        if !dead.is_empty() {
            registry.save(&self.root)?;
        }
        Ok(dead)
    }
}

impl ProcessSupervisor for PidSupervisor {
    fn is_running(&self, task_id: &str) -> bool {
        match self.entry(task_id) {
            Some(entry) => is_process_alive(entry.pid),
            None => false,
        }
    }
}
