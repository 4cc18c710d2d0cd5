//! Queue configuration commands
//!
//! `rq queue-show <project>` prints the persisted config (or the default).
//! `rq queue-set <project> --max-concurrent N [--enabled BOOL]` runs the
//! proposed config through the validation gate before persisting; turning
//! the queue on (or raising capacity) immediately attempts admission.

use anyhow::Result;
use serde_json::{json, Value};
use std::path::Path;

use super::build_controller;

pub fn show(root: &Path, project_id: &str, json_output: bool) -> Result<()> {
    let (controller, _) = build_controller(root)?;
    let config = controller.get_queue_config(project_id);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("Queue config for '{}':", project_id);
        println!("  enabled:        {}", config.enabled);
        println!("  max concurrent: {}", config.max_concurrent);
    }
    Ok(())
}

pub fn set(
    root: &Path,
    project_id: &str,
    max_concurrent: &str,
    enabled: Option<bool>,
    json_output: bool,
) -> Result<()> {
    let (controller, _) = build_controller(root)?;

    // Pass the raw value through so the gate can reject non-integers
    // (e.g. "2.5") itself rather than clap mangling them first
    let raw: Value = serde_json::from_str(max_concurrent)
        .unwrap_or_else(|_| Value::String(max_concurrent.to_string()));
    let mut proposed = json!({ "maxConcurrent": raw });
    if let Some(enabled) = enabled {
        proposed["enabled"] = json!(enabled);
    }

    let config = controller.set_queue_config(project_id, &proposed)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!(
            "Queue for '{}': enabled={}, max_concurrent={}",
            project_id, config.enabled, config.max_concurrent
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup(root: &Path) {
        super::super::init::run(root).unwrap();
        super::super::add_project::run(root, "p1", None).unwrap();
    }

    #[test]
    fn test_set_and_show() {
        let dir = tempdir().unwrap();
        setup(dir.path());
        set(dir.path(), "p1", "2", Some(true), false).unwrap();
        show(dir.path(), "p1", false).unwrap();
    }

    #[test]
    fn test_set_rejects_fractional() {
        let dir = tempdir().unwrap();
        setup(dir.path());
        let err = set(dir.path(), "p1", "2.5", Some(true), false).unwrap_err();
        assert_eq!(err.to_string(), "maxConcurrent must be an integer");
    }

    #[test]
    fn test_set_rejects_out_of_range() {
        let dir = tempdir().unwrap();
        setup(dir.path());
        for bad in ["0", "4"] {
            let err = set(dir.path(), "p1", bad, None, false).unwrap_err();
            assert!(err.to_string().contains("maxConcurrent must be between"));
        }
    }

    #[test]
    fn test_set_unknown_project_fails() {
        let dir = tempdir().unwrap();
        super::super::init::run(dir.path()).unwrap();
        let err = set(dir.path(), "ghost", "1", None, false).unwrap_err();
        assert_eq!(err.to_string(), "Project not found");
    }
}
