//! Queue status overview
//!
//! One-screen summary per project: queue config, live running/backlog
//! counts, and the active runs from the supervisor registry.

use anyhow::Result;
use runqueue::supervisor::{is_process_alive, RunRegistry};
use serde::Serialize;
use std::path::Path;

use super::build_controller;

#[derive(Debug, Serialize)]
struct ActiveRunInfo {
    task_id: String,
    pid: u32,
    uptime: String,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    project_id: String,
    #[serde(flatten)]
    queue: runqueue::queue::QueueStatus,
    active_runs: Vec<ActiveRunInfo>,
}

pub fn run(root: &Path, project_id: &str, json_output: bool) -> Result<()> {
    let (controller, _) = build_controller(root)?;
    let queue = controller.get_queue_status(project_id);

    let registry = RunRegistry::load(root)?;
    let mut active_runs: Vec<ActiveRunInfo> = registry
        .runs
        .values()
        .filter(|entry| is_process_alive(entry.pid))
        .map(|entry| ActiveRunInfo {
            task_id: entry.task_id.clone(),
            pid: entry.pid,
            uptime: entry.uptime_human(),
        })
        .collect();
    active_runs.sort_by(|a, b| a.task_id.cmp(&b.task_id));

    let output = StatusOutput {
        project_id: project_id.to_string(),
        queue,
        active_runs,
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Project: {}", output.project_id);
    println!(
        "Queue:   {} (max {})",
        if output.queue.enabled { "enabled" } else { "disabled" },
        output.queue.max_concurrent
    );
    println!(
        "Tasks:   {} running, {} in backlog",
        output.queue.running_count, output.queue.backlog_count
    );
    if output.active_runs.is_empty() {
        println!("Runs:    none");
    } else {
        println!("Runs:");
        for run in &output.active_runs {
            println!("  {} (PID {}, up {})", run.task_id, run.pid, run.uptime);
        }
    }
    Ok(())
}
