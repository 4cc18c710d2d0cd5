use anyhow::Result;
use runqueue::config::Config;
use std::fs;
use std::path::Path;

/// Initialize a runqueue directory with a default config
pub fn run(root: &Path) -> Result<()> {
    if root.join("projects").is_dir() {
        println!("Runqueue already initialized at {}", root.display());
        return Ok(());
    }

    fs::create_dir_all(root.join("projects"))?;
    fs::create_dir_all(root.join("supervisor"))?;
    fs::create_dir_all(root.join("runs"))?;
    Config::default().save(root)?;

    println!("Initialized runqueue at {}", root.display());
    println!("Next: add a project with 'rq add-project <id>'");
    Ok(())
}
