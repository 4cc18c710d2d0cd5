//! Agent process launching
//!
//! The queue controller starts runs through the `AgentLauncher` trait so
//! admission logic stays independent of how processes are actually spawned.
//! `ShellLauncher` is the production implementation: it renders the
//! configured command template, spawns the process detached with its output
//! captured to a log file, and registers the pid in the run registry.

use crate::config::LauncherConfig;
use crate::store::StoreError;
use crate::supervisor::PidSupervisor;
use crate::task::Task;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to start process for task '{task_id}': {source}")]
    Spawn {
        task_id: String,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Registry error: {0}")]
    Registry(#[from] StoreError),
}

/// Starts an agent process for an admitted task, returning its pid.
///
/// A failed launch must leave no trace: the caller keeps the task in the
/// backlog and no concurrency slot is consumed.
pub trait AgentLauncher: Send + Sync {
    fn launch(&self, task: &Task) -> Result<u32, LaunchError>;
}

/// Render a command template, substituting task placeholders
pub fn render_command(template: &str, task: &Task) -> String {
    template
        .replace("{task_id}", &task.id)
        .replace("{project_id}", &task.project_id)
        .replace("{title}", &task.title)
}

/// Launcher that spawns `sh -c <rendered template>` detached, with stdout
/// and stderr captured to `runs/<task-id>/output.log`.
pub struct ShellLauncher {
    root: PathBuf,
    config: LauncherConfig,
    supervisor: Arc<PidSupervisor>,
}

impl ShellLauncher {
    pub fn new(
        root: impl Into<PathBuf>,
        config: LauncherConfig,
        supervisor: Arc<PidSupervisor>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            supervisor,
        }
    }

    fn output_file(&self, task_id: &str) -> PathBuf {
        self.root.join("runs").join(task_id).join("output.log")
    }
}

impl AgentLauncher for ShellLauncher {
    fn launch(&self, task: &Task) -> Result<u32, LaunchError> {
        let command = render_command(&self.config.command_template, task);

        let output_path = self.output_file(&task.id);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stdout = File::create(&output_path)?;
        let stderr = stdout.try_clone()?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(Path::new(dir));
        }

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            task_id: task.id.clone(),
            source,
        })?;
        let pid = child.id();

        self.supervisor
            .register(&task.id, pid, &output_path.to_string_lossy())?;

        println!(
            "[launch] Started agent for task '{}' (PID {}) -> {}",
            task.id,
            pid,
            output_path.display()
        );

        Ok(pid)
    }
}
