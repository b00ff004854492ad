//! planexec - Dependency-Ordered Plan Executor
//!
//! planexec runs markdown "implementation plans": a goal, optional setup
//! commands, and task groups whose tasks carry ordered steps and a verify
//! command. Groups run in dependency order, independent groups concurrently
//! up to a batch limit, and the first failure aborts the run. Progress is
//! written back into the plan's `**Status:**` marker.
//!
//! # Modules
//!
//! - [`domain`] - Task, TaskGroup, and PlanDocument types
//! - [`parser`] - Plan markdown parsing and rendering
//! - [`runner`] - Command runner trait, shell runner, task execution
//! - [`scheduler`] - Dependency resolution and the plan executor
//! - [`writer`] - In-place status and checklist persistence
//! - [`plans`] - Plan listing, templates, and group insertion
//! - [`events`] - Execution log with optional JSONL sink
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod parser;
pub mod plans;
pub mod runner;
pub mod scheduler;
pub mod writer;

pub use config::{Config, ExecutionConfig};
pub use domain::{PlanDocument, PlanSpecification, PlanStatus, Task, TaskGroup, TaskStatus};
pub use error::{ParseError, PlanError, RunnerError};
pub use events::{ExecutionLog, LogEntry, LogLevel, read_execution_log};
pub use parser::{load_plan, parse_plan, render_document, render_tasks};
pub use plans::{PlanTemplate, add_group, create_plan, list_plans};
pub use runner::{CommandOutput, CommandRunner, ShellRunner, TaskOutcome, TaskRunner};
pub use scheduler::{PlanExecutor, RunReport, resolve_dependencies};
pub use writer::{persist_status, rewrite_status};
