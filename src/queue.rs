//! Per-project bounded-concurrency admission control
//!
//! The queue controller enforces `running_count <= max_concurrent` per
//! project, admits backlog tasks in FIFO order as capacity allows, and
//! exposes the queue configuration and live status. All queue mutations
//! for a project are serialized through a per-project lock: an in-process
//! mutex plus the store's cross-process lock, so concurrent CLI
//! invocations serialize too. Different projects proceed independently.

use crate::launch::{AgentLauncher, LaunchError};
use crate::store::{ProjectSettings, StoreError, TaskStore};
use crate::supervisor::ProcessSupervisor;
use crate::task::{sort_fifo, LogEntry, Task, TaskStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Hard bounds on per-project concurrency
pub const MIN_CONCURRENT: u8 = 1;
pub const MAX_CONCURRENT: u8 = 3;

/// Per-project queue configuration, persisted under `settings.queueConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u8,
}

fn default_max_concurrent() -> u8 {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Validation failures from the configuration gate.
/// Checked in order; the first failure wins.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("maxConcurrent must be an integer")]
    NotAnInteger,
    #[error("maxConcurrent must be between 1 and 3")]
    OutOfRange,
    #[error("Project not found")]
    ProjectNotFound,
}

impl QueueConfig {
    /// Validate a proposed configuration from raw JSON.
    ///
    /// Takes `serde_json::Value` rather than a typed struct so a fractional
    /// `maxConcurrent` (e.g. 2.5) is observable and rejected instead of
    /// silently truncated. `enabled` defaults to false when absent.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let raw = value.get("maxConcurrent").ok_or(ConfigError::NotAnInteger)?;
        let max_concurrent = raw.as_i64().ok_or(ConfigError::NotAnInteger)?;
        if max_concurrent < MIN_CONCURRENT as i64 || max_concurrent > MAX_CONCURRENT as i64 {
            return Err(ConfigError::OutOfRange);
        }
        let enabled = value
            .get("enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Self {
            enabled,
            max_concurrent: max_concurrent as u8,
        })
    }
}

/// Live queue status, recomputed from task state and process membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub enabled: bool,
    pub max_concurrent: u8,
    pub running_count: usize,
    pub backlog_count: usize,
}

impl Default for QueueStatus {
    fn default() -> Self {
        let config = QueueConfig::default();
        Self {
            enabled: config.enabled,
            max_concurrent: config.max_concurrent,
            running_count: 0,
            backlog_count: 0,
        }
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Project not found")]
    ProjectNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Task '{0}' not found")]
    TaskNotFound(String),
    #[error("Cannot recover task '{task_id}': {reason}")]
    RecoveryRejected { task_id: String, reason: String },
    #[error("Failed to admit task '{task_id}': {source}")]
    Launch {
        task_id: String,
        #[source]
        source: LaunchError,
    },
}

/// Bounded-concurrency admission controller.
///
/// Collaborators are injected: the task store, the process supervisor
/// (consulted for the true running count), and the launcher that starts
/// agent processes.
pub struct QueueController {
    store: Arc<dyn TaskStore>,
    supervisor: Arc<dyn ProcessSupervisor>,
    launcher: Arc<dyn AgentLauncher>,
    project_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl QueueController {
    pub fn new(
        store: Arc<dyn TaskStore>,
        supervisor: Arc<dyn ProcessSupervisor>,
        launcher: Arc<dyn AgentLauncher>,
    ) -> Self {
        Self {
            store,
            supervisor,
            launcher,
            project_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn supervisor(&self) -> &Arc<dyn ProcessSupervisor> {
        &self.supervisor
    }

    /// The in-process serialization lock for a project's queue mutations
    fn project_lock(&self, project_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .project_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` holding the project's queue lock, in-process and
    /// cross-process. Every read-admit-write sequence goes through here;
    /// `f` must not re-enter (the locks are not reentrant).
    pub(crate) fn with_project_lock<T>(
        &self,
        project_id: &str,
        f: impl FnOnce() -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let lock = self.project_lock(project_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let _store_lock = self.store.lock_project(project_id)?;
        f()
    }

    /// The persisted queue config, or the disabled default when the project
    /// or its config does not exist. Never fails: queue configuration reads
    /// are best-effort by design (unlike `set_queue_config`, which requires
    /// the project to exist).
    pub fn get_queue_config(&self, project_id: &str) -> QueueConfig {
        match self.store.get_project(project_id) {
            Ok(Some(project)) => project.settings.queue_config.unwrap_or_default(),
            _ => QueueConfig::default(),
        }
    }

    /// Live queue status. Unknown projects get the disabled default status
    /// rather than an error, mirroring `get_queue_config`.
    pub fn get_queue_status(&self, project_id: &str) -> QueueStatus {
        let config = self.get_queue_config(project_id);
        let tasks = match self.store.tasks(project_id) {
            Ok(tasks) => tasks,
            Err(_) => Vec::new(),
        };
        let running_count = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress && self.supervisor.is_running(&t.id))
            .count();
        let backlog_count = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Backlog)
            .count();
        QueueStatus {
            enabled: config.enabled,
            max_concurrent: config.max_concurrent,
            running_count,
            backlog_count,
        }
    }

    /// Validate and persist a queue configuration, then attempt admission
    /// if the update turned the queue on or raised its capacity.
    ///
    /// The config is persisted before admission runs, so an admission
    /// failure leaves the new configuration in place; the failed task
    /// stays in the backlog.
    pub fn set_queue_config(
        &self,
        project_id: &str,
        value: &Value,
    ) -> Result<QueueConfig, QueueError> {
        let config = QueueConfig::from_value(value)?;

        self.with_project_lock(project_id, || {
            let project = self
                .store
                .get_project(project_id)?
                .ok_or(ConfigError::ProjectNotFound)?;
            let previous = project.settings.queue_config.unwrap_or_default();

            let mut settings = project.settings.clone();
            settings.queue_config = Some(config);
            self.store.update_project_settings(project_id, &settings)?;

            let newly_enabled = config.enabled && !previous.enabled;
            let capacity_grew = config.enabled && config.max_concurrent > previous.max_concurrent;
            if newly_enabled || capacity_grew {
                self.admit_locked(project_id, &config)?;
            }

            Ok(config)
        })
    }

    /// Re-evaluate admission for a project. Idempotent: at capacity, with
    /// an empty backlog, or with the queue disabled this is a no-op.
    /// Returns the IDs of tasks admitted by this call.
    pub fn trigger_queue(&self, project_id: &str) -> Result<Vec<String>, QueueError> {
        self.with_project_lock(project_id, || {
            // Config is read under the lock so admission cannot proceed on
            // a snapshot that a concurrent update has already replaced
            let config = self.get_queue_config(project_id);
            if !config.enabled {
                return Ok(Vec::new());
            }
            self.admit_locked(project_id, &config)
        })
    }

    /// Admission loop. Caller must hold the project lock.
    ///
    /// Pops backlog tasks in FIFO order (by enqueue time, task id as
    /// tiebreak) while capacity remains. A launch failure stops admission
    /// and is returned to the caller; the failed task keeps its backlog
    /// status and the slot is not consumed.
    pub(crate) fn admit_locked(
        &self,
        project_id: &str,
        config: &QueueConfig,
    ) -> Result<Vec<String>, QueueError> {
        let tasks = self.store.tasks(project_id)?;

        let running = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress && self.supervisor.is_running(&t.id))
            .count();

        let mut backlog: Vec<Task> = tasks
            .into_iter()
            .filter(|t| t.status == TaskStatus::Backlog)
            .collect();
        sort_fifo(&mut backlog);

        let mut admitted = Vec::new();
        for mut task in backlog {
            if running + admitted.len() >= config.max_concurrent as usize {
                break;
            }

            if let Err(source) = self.launcher.launch(&task) {
                // Task stays in backlog; no bookkeeping was touched
                return Err(QueueError::Launch {
                    task_id: task.id.clone(),
                    source,
                });
            }

            let now = Utc::now().to_rfc3339();
            task.status = TaskStatus::InProgress;
            task.started_at = Some(now.clone());
            task.log.push(LogEntry {
                timestamp: now,
                actor: None,
                message: "Admitted from backlog".to_string(),
            });
            self.store.upsert_task(&task)?;
            admitted.push(task.id);
        }

        Ok(admitted)
    }
}
