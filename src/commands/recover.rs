//! Apply a recovery action to a single task
//!
//! Actions mirror what the health check suggests:
//! - recover-stuck: return a stuck task to the backlog and re-trigger
//! - view-logs: print the path of the run's output log
//! - discard: remove the task from the store

use anyhow::Result;
use clap::ValueEnum;
use runqueue::reconcile::{discard_task, recover_stuck};
use std::path::Path;

use super::build_controller;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    RecoverStuck,
    ViewLogs,
    Discard,
}

pub fn run(root: &Path, project_id: &str, task_id: &str, action: Action) -> Result<()> {
    let (controller, supervisor) = build_controller(root)?;

    match action {
        Action::RecoverStuck => {
            let outcome = recover_stuck(&controller, project_id, task_id)?;
            println!("Re-queued '{}'", task_id);
            for admitted in &outcome.admitted {
                println!("Admitted '{}'", admitted);
            }
        }
        Action::ViewLogs => match supervisor.entry(task_id) {
            Some(entry) => println!("{}", entry.output_file),
            None => anyhow::bail!("No run recorded for task '{}'", task_id),
        },
        Action::Discard => {
            discard_task(&controller, project_id, task_id)?;
            // Drop any stale registry entry along with the task
            supervisor.remove(task_id)?;
            println!("Discarded '{}'", task_id);
        }
    }
    Ok(())
}
