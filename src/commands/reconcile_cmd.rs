//! Reconciliation command
//!
//! Prunes dead pids from the run registry, re-queues tasks whose process
//! died, and re-triggers admission. This is the recovery path that frees
//! concurrency slots after an agent crash.

use anyhow::Result;
use runqueue::reconcile::reconcile;
use std::path::Path;

use super::build_controller;

pub fn run(root: &Path, project_id: &str) -> Result<()> {
    let (controller, supervisor) = build_controller(root)?;

    let pruned = supervisor.cleanup_dead()?;
    if !pruned.is_empty() {
        println!("[reconcile] Pruned {} dead run(s) from registry", pruned.len());
    }

    let outcome = reconcile(&controller, project_id)?;

    if outcome.requeued.is_empty() && outcome.admitted.is_empty() {
        println!("Nothing to reconcile for '{}'", project_id);
        return Ok(());
    }
    for task_id in &outcome.requeued {
        println!("Re-queued '{}'", task_id);
    }
    for task_id in &outcome.admitted {
        println!("Admitted '{}'", task_id);
    }
    Ok(())
}
