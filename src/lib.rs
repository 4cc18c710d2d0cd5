pub mod config;
pub mod health;
pub mod launch;
pub mod queue;
pub mod reconcile;
pub mod store;
pub mod supervisor;
pub mod task;

#[cfg(any(test, feature = "test-support"))]
pub mod test_helpers;

pub use config::{Config, LauncherConfig};
pub use health::{
    evaluate, recovery_actions, HealthIssue, IssueKind, RecoveryAction, Severity, SpecArtifacts,
};
pub use launch::{AgentLauncher, LaunchError, ShellLauncher};
pub use queue::{
    ConfigError, QueueConfig, QueueController, QueueError, QueueStatus, MAX_CONCURRENT,
    MIN_CONCURRENT,
};
pub use reconcile::{
    discard_task, health_check, reconcile, recover_stuck, ReconcileOutcome, TaskHealth,
};
pub use store::{FileStore, Project, ProjectLock, ProjectSettings, StoreError, TaskStore};
pub use supervisor::{is_process_alive, PidSupervisor, ProcessSupervisor, RunEntry, RunRegistry};
pub use task::{ExecutionProgress, LogEntry, Subtask, SubtaskStatus, Task, TaskStatus};
