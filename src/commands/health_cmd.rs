//! Project-wide task health check
//!
//! Sweeps every task in the project through the health evaluator and
//! prints the ones with issues. An empty report means all healthy.

use anyhow::Result;
use runqueue::health::Severity;
use runqueue::reconcile::health_check;
use std::path::Path;

use super::build_controller;

pub fn run(root: &Path, project_id: &str, json_output: bool) -> Result<()> {
    let (controller, _) = build_controller(root)?;
    let reports = health_check(
        controller.store().as_ref(),
        controller.supervisor().as_ref(),
        project_id,
    )?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("All tasks healthy in '{}'", project_id);
        return Ok(());
    }

    for report in &reports {
        println!("{}:", report.task_id);
        for issue in &report.issues {
            let marker = match issue.severity {
                Severity::Error => "error",
                Severity::Warning => "warn ",
            };
            match &issue.details {
                Some(details) => println!("  [{}] {} ({})", marker, issue.message, details),
                None => println!("  [{}] {}", marker, issue.message),
            }
        }
        let actions: Vec<String> = report
            .recovery_actions
            .iter()
            .map(|a| {
                serde_json::to_value(a)
                    .ok()
                    .and_then(|v| v.as_str().map(|s| s.to_string()))
                    .unwrap_or_default()
            })
            .collect();
        println!("  recovery: {}", actions.join(", "));
    }
    Ok(())
}
