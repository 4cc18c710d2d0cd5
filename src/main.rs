use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "rq")]
#[command(about = "Runqueue - bounded-concurrency run queue for coding agents")]
#[command(version)]
struct Cli {
    /// Path to the runqueue directory (default: .runqueue in current dir)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Output as JSON for machine consumption
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new runqueue in the current directory
    Init,

    /// Register a new project
    AddProject {
        /// Project ID
        id: String,

        /// Human-readable project name
        #[arg(long)]
        name: Option<String>,
    },

    /// Add a task to a project's backlog
    Add {
        /// Project ID
        project: String,

        /// Task title
        title: String,

        /// Task ID (auto-generated if not provided)
        #[arg(long)]
        id: Option<String>,

        /// Directory holding the task's spec artifacts
        #[arg(long)]
        specs_path: Option<String>,
    },

    /// List a project's tasks in queue order
    List {
        /// Project ID
        project: String,
    },

    /// Show a project's queue configuration
    QueueShow {
        /// Project ID
        project: String,
    },

    /// Update a project's queue configuration
    QueueSet {
        /// Project ID
        project: String,

        /// Maximum concurrent runs (integer, 1-3)
        #[arg(long)]
        max_concurrent: String,

        /// Enable or disable the queue (defaults to false when omitted)
        #[arg(long)]
        enabled: Option<bool>,
    },

    /// Show queue status and active runs
    Status {
        /// Project ID
        project: String,
    },

    /// Re-evaluate admission for a project
    Trigger {
        /// Project ID
        project: String,
    },

    /// Check task health across a project
    Health {
        /// Project ID
        project: String,
    },

    /// Re-queue crashed runs and re-trigger admission
    Reconcile {
        /// Project ID
        project: String,
    },

    /// Apply a recovery action to a task
    Recover {
        /// Project ID
        project: String,

        /// Task ID
        task: String,

        /// Recovery action to apply
        #[arg(long, value_enum)]
        action: commands::recover::Action,
    },

    /// Mark a task as done and free its slot
    Done {
        /// Project ID
        project: String,

        /// Task ID
        task: String,
    },

    /// Mark a task as failed and free its slot
    Fail {
        /// Project ID
        project: String,

        /// Task ID
        task: String,

        /// Reason for the failure
        #[arg(long)]
        reason: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = commands::runqueue_dir(&cli.dir);

    match cli.command {
        Commands::Init => commands::init::run(&root),
        Commands::AddProject { id, name } => {
            commands::add_project::run(&root, &id, name.as_deref())
        }
        Commands::Add {
            project,
            title,
            id,
            specs_path,
        } => commands::add::run(&root, &project, &title, id.as_deref(), specs_path.as_deref()),
        Commands::List { project } => commands::list::run(&root, &project, cli.json),
        Commands::QueueShow { project } => commands::queue_cmd::show(&root, &project, cli.json),
        Commands::QueueSet {
            project,
            max_concurrent,
            enabled,
        } => commands::queue_cmd::set(&root, &project, &max_concurrent, enabled, cli.json),
        Commands::Status { project } => commands::status::run(&root, &project, cli.json),
        Commands::Trigger { project } => commands::trigger::run(&root, &project),
        Commands::Health { project } => commands::health_cmd::run(&root, &project, cli.json),
        Commands::Reconcile { project } => commands::reconcile_cmd::run(&root, &project),
        Commands::Recover {
            project,
            task,
            action,
        } => commands::recover::run(&root, &project, &task, action),
        Commands::Done { project, task } => commands::done::run(&root, &project, &task),
        Commands::Fail {
            project,
            task,
            reason,
        } => commands::fail::run(&root, &project, &task, reason.as_deref()),
    }
}
