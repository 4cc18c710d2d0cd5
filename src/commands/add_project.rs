use anyhow::Result;
use runqueue::store::{FileStore, Project, ProjectSettings, TaskStore};
use std::path::Path;

use super::ensure_initialized;

/// Register a new project
pub fn run(root: &Path, id: &str, name: Option<&str>) -> Result<()> {
    ensure_initialized(root)?;
    let store = FileStore::new(root);

    if store.get_project(id)?.is_some() {
        anyhow::bail!("Project '{}' already exists", id);
    }

    store.create_project(&Project {
        id: id.to_string(),
        name: name.map(|s| s.to_string()),
        settings: ProjectSettings::default(),
    })?;

    println!("Added project '{}'", id);
    println!("Queue is disabled by default. Enable with 'rq queue-set {} --enabled true'", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_project() {
        let dir = tempdir().unwrap();
        super::super::init::run(dir.path()).unwrap();
        run(dir.path(), "p1", Some("My Project")).unwrap();

        let store = FileStore::new(dir.path());
        let project = store.get_project("p1").unwrap().unwrap();
        assert_eq!(project.name, Some("My Project".to_string()));
    }

    #[test]
    fn test_add_duplicate_fails() {
        let dir = tempdir().unwrap();
        super::super::init::run(dir.path()).unwrap();
        run(dir.path(), "p1", None).unwrap();
        let err = run(dir.path(), "p1", None).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_add_uninitialized_fails() {
        let dir = tempdir().unwrap();
        let err = run(dir.path(), "p1", None).unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }
}
