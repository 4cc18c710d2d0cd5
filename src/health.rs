//! Task health evaluation
//!
//! Pure classification of a task's persisted state into zero or more
//! health issues, each carrying a recommended recovery action. No side
//! effects: the only filesystem touch is `SpecArtifacts::probe`, which
//! callers run once per task and pass in as evidence.
//!
//! All rules are evaluated for every task regardless of whether earlier
//! rules matched, so a single task can carry several simultaneous issues.

use crate::task::{ExecutionProgress, Task, TaskStatus};
use serde::Serialize;
use std::path::Path;

/// How serious an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// The closed set of detectable issue categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Marked in-progress but no live process attached
    Stuck,
    /// Task status is error, or the runtime reported a failed phase
    Failed,
    /// One or more subtasks have failed status
    FailedSubtasks,
    /// qa_report.md carries a rejection marker
    QaRejected,
    /// specs directory exists but spec.md is absent
    MissingArtifact,
    /// implementation_plan.json exists but is not valid JSON
    Corrupted,
    /// In-progress with no sign of actual progress
    NoProgress,
}

/// A single detected issue on a task
#[derive(Debug, Clone, Serialize)]
pub struct HealthIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Suggested remediation for a detected issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Re-admit the task into the queue
    RecoverStuck,
    /// Inspect the run's output log
    ViewLogs,
    /// Remove the task from the store
    DiscardTask,
}

/// Evidence gathered from a task's specs directory.
///
/// Probing never fails: filesystem errors count as absence. A task with no
/// `specs_path` at all produces the default (nothing present, no issues).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecArtifacts {
    /// The specs directory itself exists
    pub dir_present: bool,
    /// spec.md exists inside the directory
    pub spec_present: bool,
    /// implementation_plan.json: None = absent, Some(false) = unparseable
    pub plan_valid: Option<bool>,
    /// qa_report.md contains a rejection marker line
    pub qa_rejected: bool,
}

impl SpecArtifacts {
    /// Probe the three well-known filenames under a specs directory.
    /// Unreadable files and missing paths are treated as absent.
    pub fn probe(specs_path: &Path) -> Self {
        let dir_present = specs_path.is_dir();
        if !dir_present {
            return Self::default();
        }

        let spec_present = specs_path.join("spec.md").is_file();

        let plan_path = specs_path.join("implementation_plan.json");
        let plan_valid = if plan_path.is_file() {
            match std::fs::read_to_string(&plan_path) {
                Ok(content) => {
                    Some(serde_json::from_str::<serde_json::Value>(&content).is_ok())
                }
                // Unreadable counts as absent, not corrupted
                Err(_) => None,
            }
        } else {
            None
        };

        let qa_rejected = match std::fs::read_to_string(specs_path.join("qa_report.md")) {
            Ok(content) => content
                .lines()
                .any(|line| line.contains("Status: REJECTED") || line.contains("Status: FAILED")),
            Err(_) => false,
        };

        Self {
            dir_present,
            spec_present,
            plan_valid,
            qa_rejected,
        }
    }

    /// Probe a task's specs directory, defaulting when the task has none
    pub fn probe_task(task: &Task) -> Self {
        match &task.specs_path {
            Some(path) => Self::probe(Path::new(path)),
            None => Self::default(),
        }
    }
}

/// Rule 1: in-progress with no live process
pub fn check_stuck(task: &Task, process_running: bool) -> Option<HealthIssue> {
    if task.status == TaskStatus::InProgress && !process_running {
        return Some(HealthIssue {
            kind: IssueKind::Stuck,
            severity: Severity::Error,
            message: "Task is marked in progress but no agent process is running".to_string(),
            details: None,
        });
    }
    None
}

/// Rule 2: error status, or a runtime-reported failed phase
pub fn check_failed(task: &Task) -> Option<HealthIssue> {
    let phase_failed = task
        .execution_progress
        .as_ref()
        .and_then(|p| p.phase.as_deref())
        == Some(ExecutionProgress::PHASE_FAILED);

    if task.status == TaskStatus::Error || phase_failed {
        let details = task
            .execution_progress
            .as_ref()
            .and_then(|p| p.message.clone());
        return Some(HealthIssue {
            kind: IssueKind::Failed,
            severity: Severity::Error,
            message: "Task execution failed".to_string(),
            details,
        });
    }
    None
}

/// Rule 3: one or more failed subtasks
pub fn check_failed_subtasks(task: &Task) -> Option<HealthIssue> {
    let failed: Vec<&str> = task.failed_subtasks().map(|s| s.title.as_str()).collect();
    if failed.is_empty() {
        return None;
    }
    Some(HealthIssue {
        kind: IssueKind::FailedSubtasks,
        severity: Severity::Error,
        message: format!("{} subtask(s) failed", failed.len()),
        details: Some(failed.join(", ")),
    })
}

/// Rule 4: QA report carries a rejection marker
pub fn check_qa_rejected(artifacts: &SpecArtifacts) -> Option<HealthIssue> {
    if artifacts.qa_rejected {
        return Some(HealthIssue {
            kind: IssueKind::QaRejected,
            severity: Severity::Warning,
            message: "QA report rejected the implementation".to_string(),
            details: None,
        });
    }
    None
}

/// Rule 5: specs directory exists but spec.md is missing
pub fn check_missing_artifact(artifacts: &SpecArtifacts) -> Option<HealthIssue> {
    if artifacts.dir_present && !artifacts.spec_present {
        return Some(HealthIssue {
            kind: IssueKind::MissingArtifact,
            severity: Severity::Error,
            message: "spec.md file is missing".to_string(),
            details: None,
        });
    }
    None
}

/// Rule 6: implementation plan exists but is not valid JSON
pub fn check_corrupted(artifacts: &SpecArtifacts) -> Option<HealthIssue> {
    if artifacts.plan_valid == Some(false) {
        return Some(HealthIssue {
            kind: IssueKind::Corrupted,
            severity: Severity::Error,
            message: "implementation_plan.json exists but contains invalid JSON".to_string(),
            details: None,
        });
    }
    None
}

/// Rule 7: in-progress but nothing indicates actual progress
pub fn check_no_progress(task: &Task) -> Option<HealthIssue> {
    if task.status != TaskStatus::InProgress {
        return None;
    }
    let no_progress = match &task.execution_progress {
        None => true,
        Some(p) => {
            let empty = |v: &Option<String>| v.as_deref().map_or(true, |s| s.is_empty());
            empty(&p.phase)
                && empty(&p.current_subtask)
                && empty(&p.started_at)
                && p.overall_progress == 0
        }
    };
    if no_progress {
        return Some(HealthIssue {
            kind: IssueKind::NoProgress,
            severity: Severity::Warning,
            message: "Task is in progress but has reported no progress".to_string(),
            details: None,
        });
    }
    None
}

/// Run every rule against a task and collect all matches.
///
/// Rules never short-circuit: stuck + failed_subtasks + qa_rejected on the
/// same task is a legitimate (and common) outcome after a crash.
pub fn evaluate(task: &Task, process_running: bool, artifacts: &SpecArtifacts) -> Vec<HealthIssue> {
    let mut issues = Vec::new();
    issues.extend(check_stuck(task, process_running));
    issues.extend(check_failed(task));
    issues.extend(check_failed_subtasks(task));
    issues.extend(check_qa_rejected(artifacts));
    issues.extend(check_missing_artifact(artifacts));
    issues.extend(check_corrupted(artifacts));
    issues.extend(check_no_progress(task));
    issues
}

/// Map a single issue kind to its applicable recovery actions
pub fn actions_for(kind: IssueKind) -> &'static [RecoveryAction] {
    match kind {
        IssueKind::Stuck => &[RecoveryAction::RecoverStuck],
        IssueKind::Failed => &[RecoveryAction::ViewLogs],
        IssueKind::FailedSubtasks => &[RecoveryAction::ViewLogs],
        IssueKind::QaRejected => &[RecoveryAction::ViewLogs],
        IssueKind::MissingArtifact => &[RecoveryAction::DiscardTask],
        IssueKind::Corrupted => &[RecoveryAction::DiscardTask],
        IssueKind::NoProgress => &[RecoveryAction::ViewLogs],
    }
}

/// Deduplicated recovery actions for a set of issues, in first-seen order
pub fn recovery_actions(issues: &[HealthIssue]) -> Vec<RecoveryAction> {
    let mut actions = Vec::new();
    for issue in issues {
        for action in actions_for(issue.kind) {
            if !actions.contains(action) {
                actions.push(*action);
            }
        }
    }
    actions
}
