use serde::{Deserialize, Serialize};

/// A log entry for tracking progress/notes on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub message: String,
}

/// Task status as tracked by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Backlog,
    InProgress,
    HumanReview,
    Done,
    Error,
}

impl TaskStatus {
    /// Terminal statuses: no further execution will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

/// Subtask status as reported by the agent runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A single subtask within a task's implementation plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: SubtaskStatus,
}

/// Execution progress reported by the agent runtime while a task runs.
///
/// All fields besides `overall_progress` are optional: an agent that has
/// just started may not have reported a phase or subtask yet. Absence of
/// the whole struct, or a `phase` of "failed", are observable conditions
/// for health evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExecutionProgress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Percent complete, 0-100
    #[serde(default)]
    pub overall_progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_subtask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When execution started (ISO 8601 / RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

impl ExecutionProgress {
    /// Phase value the agent runtime writes when a run fails outright
    pub const PHASE_FAILED: &'static str = "failed";
}

/// A unit of work tracked by the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Progress reported by the agent runtime (absent until a run starts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_progress: Option<ExecutionProgress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,
    /// Directory holding spec artifacts (spec.md, implementation_plan.json,
    /// qa_report.md) used for health diagnosis only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs_path: Option<String>,
    /// Timestamp when the task was created (ISO 8601 / RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Timestamp used for backlog ordering. Defaults to `created_at`;
    /// refreshed when a crashed task is re-queued so it rejoins the
    /// backlog at the back rather than its original position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enqueued_at: Option<String>,
    /// Timestamp when the task was last admitted (ISO 8601 / RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Timestamp when the task reached a terminal status (ISO 8601 / RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Progress log entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<LogEntry>,
    /// Reason for the most recent failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Task {
    /// The key used for FIFO backlog ordering: `enqueued_at` when set,
    /// otherwise `created_at`. Tasks with no timestamp sort last.
    pub fn queue_key(&self) -> Option<&str> {
        self.enqueued_at
            .as_deref()
            .or(self.created_at.as_deref())
    }

    /// Count of subtasks with failed status
    pub fn failed_subtasks(&self) -> impl Iterator<Item = &Subtask> {
        self.subtasks
            .iter()
            .filter(|s| s.status == SubtaskStatus::Failed)
    }
}

/// Sort tasks into FIFO admission order: by queue key ascending, with task
/// id as the deterministic tiebreak for identical timestamps.
pub fn sort_fifo(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        match (a.queue_key(), b.queue_key()) {
            (Some(x), Some(y)) => x.cmp(y).then_with(|| a.id.cmp(&b.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with_times(id: &str, created: Option<&str>, enqueued: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            created_at: created.map(|s| s.to_string()),
            enqueued_at: enqueued.map(|s| s.to_string()),
            ..Task::default()
        }
    }

    #[test]
    fn test_status_terminal() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::Backlog.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::Error.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let json = serde_json::to_string(&TaskStatus::HumanReview).unwrap();
        assert_eq!(json, "\"human_review\"");
    }

    #[test]
    fn test_queue_key_prefers_enqueued_at() {
        let t = task_with_times("t1", Some("2026-01-01T00:00:00Z"), Some("2026-02-01T00:00:00Z"));
        assert_eq!(t.queue_key(), Some("2026-02-01T00:00:00Z"));
    }

    #[test]
    fn test_sort_fifo_by_creation() {
        let mut tasks = vec![
            task_with_times("b", Some("2026-01-02T00:00:00Z"), None),
            task_with_times("a", Some("2026-01-01T00:00:00Z"), None),
        ];
        sort_fifo(&mut tasks);
        assert_eq!(tasks[0].id, "a");
        assert_eq!(tasks[1].id, "b");
    }

    #[test]
    fn test_sort_fifo_tiebreak_by_id() {
        let mut tasks = vec![
            task_with_times("z", Some("2026-01-01T00:00:00Z"), None),
            task_with_times("a", Some("2026-01-01T00:00:00Z"), None),
        ];
        sort_fifo(&mut tasks);
        assert_eq!(tasks[0].id, "a");
    }

    #[test]
    fn test_sort_fifo_requeued_goes_last() {
        let mut tasks = vec![
            task_with_times("crashed", Some("2026-01-01T00:00:00Z"), Some("2026-01-03T00:00:00Z")),
            task_with_times("waiting", Some("2026-01-02T00:00:00Z"), None),
        ];
        sort_fifo(&mut tasks);
        assert_eq!(tasks[0].id, "waiting");
        assert_eq!(tasks[1].id, "crashed");
    }

    #[test]
    fn test_failed_subtasks_filter() {
        let task = Task {
            id: "t1".to_string(),
            subtasks: vec![
                Subtask {
                    id: "s1".to_string(),
                    title: "ok".to_string(),
                    status: SubtaskStatus::Completed,
                },
                Subtask {
                    id: "s2".to_string(),
                    title: "broken".to_string(),
                    status: SubtaskStatus::Failed,
                },
            ],
            ..Task::default()
        };
        let failed: Vec<_> = task.failed_subtasks().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].title, "broken");
    }
}
