//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use super::output::{Output, OutputFormat};
use super::{dep, priority, query, task};
use crate::domain::TaskId;
use crate::logging;
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "taskgraph")]
#[command(author, version, about = "Task dependency graph and priority planner")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Shorthand for --log-level debug
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Log level for diagnostics on stderr
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new taskgraph project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage tasks
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Manage dependencies between tasks
    #[command(subcommand)]
    Dep(dep::DepCommands),

    /// Show everything a task depends on, depth first
    Chain {
        /// Task ID
        task: TaskId,
    },

    /// Show the longest dependency path starting at a task
    CriticalPath {
        /// Task ID
        task: TaskId,
    },

    /// Check whether every dependency of a task is completed
    CanStart {
        /// Task ID
        task: TaskId,
    },

    /// Show tasks ready to work on
    Ready,

    /// Show blocked tasks
    Blocked,

    /// Show all tasks with dependencies before dependents
    Order,

    /// Show the priority score of a task
    Score {
        /// Task ID
        task: TaskId,
    },

    /// Recommend the next tasks for a user
    Recommend {
        /// Assignee to recommend for (defaults to config, $TASKGRAPH_USER, $USER)
        #[arg(long, short)]
        user: Option<String>,

        /// Maximum number of tasks (defaults to recommend_limit in config)
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Rewrite task priorities to match their scores
    Adjust,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    logging::init_logging(cli.log_level, cli.verbose, config.project.log_level.as_deref())?;

    let output = Output::new(cli.format.unwrap_or(config.global.default_format));
    debug!(project = ?config.project_root, "taskgraph starting");

    match cli.command {
        Commands::Init { path } => {
            let project = Project::init(&path)?;
            output.success(&format!(
                "Initialized taskgraph project at {}",
                project.root().display()
            ));
        }

        Commands::Task(cmd) => task::run(cmd, &output)?,
        Commands::Dep(cmd) => dep::run(cmd, &output)?,

        Commands::Chain { task } => query::chain(&output, &task)?,
        Commands::CriticalPath { task } => query::critical_path(&output, &task)?,
        Commands::CanStart { task } => query::can_start(&output, &task)?,
        Commands::Ready => query::ready(&output)?,
        Commands::Blocked => query::blocked(&output)?,
        Commands::Order => query::order(&output)?,

        Commands::Score { task } => priority::score(&output, &task)?,
        Commands::Recommend { user, limit } => {
            priority::recommend(&output, user.as_deref(), limit)?
        }
        Commands::Adjust => priority::adjust(&output)?,
    }

    debug!("command completed");
    Ok(())
}
