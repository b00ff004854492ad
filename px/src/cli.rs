//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::Task;
use crate::plans::{PlanTemplate, parse_task_spec};

/// planexec - run markdown implementation plans
#[derive(Parser)]
#[command(
    name = "px",
    about = "Dependency-ordered parallel executor for markdown implementation plans",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a plan
    Run {
        /// Plan file (absolute, relative to cwd, or relative to plans-dir)
        plan: PathBuf,

        /// Maximum number of groups run concurrently
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Print the plan summary without executing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Only print errors
        #[arg(short, long)]
        quiet: bool,

        /// Tick the steps of completed tasks in the plan file
        #[arg(long)]
        mark_steps: bool,
    },

    /// List plans in the plans directory
    List,

    /// Create a new plan from a template
    New {
        /// Plan template (feature, bugfix, refactor)
        #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "feature")]
        plan_type: PlanTemplate,

        /// Plan name, used for the title and file name
        #[arg(long)]
        name: String,

        /// High-level goal
        #[arg(short, long)]
        goal: String,
    },

    /// Append a task group to an existing plan
    AddGroup {
        /// Plan file
        plan: PathBuf,

        /// Group name
        #[arg(long)]
        name: String,

        /// Task as "name|context|verify|step;step" (repeatable)
        #[arg(long = "task", value_name = "TASK", value_parser = parse_task_arg)]
        tasks: Vec<Task>,
    },
}

fn parse_task_arg(s: &str) -> Result<Task, String> {
    debug!(%s, "parse_task_arg: called");
    parse_task_spec(s)
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planexec")
        .join("logs")
        .join("planexec.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    format!("Logs are written to: {}\n", get_log_path().display())
}
