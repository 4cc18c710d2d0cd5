//! Crate-level configuration
//!
//! Stored in `.runqueue/config.toml`. Controls how agent processes are
//! launched; the per-project queue configuration lives in project settings
//! (`settings.queueConfig`), not here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Launcher configuration
    #[serde(default)]
    pub launcher: LauncherConfig,
}

/// How to start an agent process for an admitted task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Command template for agent execution.
    /// Placeholders: {task_id}, {project_id}, {title}
    #[serde(default = "default_command_template")]
    pub command_template: String,

    /// Working directory for launched processes (default: current dir)
    #[serde(default)]
    pub working_dir: Option<String>,
}

fn default_command_template() -> String {
    "agent run --task {task_id} --project {project_id}".to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            command_template: default_command_template(),
            working_dir: None,
        }
    }
}

impl Config {
    /// Load config from `<root>/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = root.join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to `<root>/config.toml`
    pub fn save(&self, root: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(root)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(root.join("config.toml"), content)?;
        Ok(())
    }
}
