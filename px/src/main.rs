//! planexec - Dependency-Ordered Plan Executor
//!
//! CLI entry point for running, listing, and authoring plans.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use planexec::cli::{Cli, Command, generate_after_help, get_log_path};
use planexec::config::Config;
use planexec::domain::Task;
use planexec::events::ExecutionLog;
use planexec::parser::load_plan;
use planexec::plans::{PlanTemplate, add_group, create_plan, list_plans};
use planexec::runner::ShellRunner;
use planexec::scheduler::PlanExecutor;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cmd = Cli::command().after_help(generate_after_help());

    // Usage errors exit 1; --help and --version exit 0
    let matches = match cmd.try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return Ok(code);
        }
    };
    let cli = Cli::from_arg_matches(&matches)?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(plans_dir = ?config.plans_dir, project_root = ?config.project_root, "planexec loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run {
            plan,
            batch_size,
            dry_run,
            quiet,
            mark_steps,
        }) => {
            debug!(?plan, ?batch_size, dry_run, quiet, mark_steps, "main: matched Run command");
            cmd_run(&config, &plan, batch_size, dry_run, quiet, mark_steps).await
        }
        Some(Command::List) => {
            debug!("main: matched List command");
            cmd_list(&config)
        }
        Some(Command::New { plan_type, name, goal }) => {
            debug!(%plan_type, %name, "main: matched New command");
            cmd_new(&config, plan_type, &name, &goal)
        }
        Some(Command::AddGroup { plan, name, tasks }) => {
            debug!(?plan, %name, tasks = tasks.len(), "main: matched AddGroup command");
            cmd_add_group(&config, &plan, &name, tasks)
        }
        None => {
            debug!("main: no command given");
            Cli::command().after_help(generate_after_help()).print_help()?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn fail(message: impl Display) -> ExitCode {
    println!("{} {}", "[ERROR]".red(), message);
    ExitCode::FAILURE
}

async fn cmd_run(
    config: &Config,
    plan: &Path,
    batch_size: Option<usize>,
    dry_run: bool,
    quiet: bool,
    mark_steps: bool,
) -> Result<ExitCode> {
    debug!(?plan, "cmd_run: called");
    let mut execution = config.execution.clone();
    if let Some(batch_size) = batch_size {
        execution.batch_size = batch_size;
    }
    execution.mark_steps |= mark_steps;

    let path = config.resolve_plan_path(plan);
    let mut log = ExecutionLog::new().with_quiet(quiet);
    let mut doc = match load_plan(&path) {
        Ok(doc) => doc,
        Err(e) => {
            log.error(format!("Failed to parse plan: {}", e));
            return Ok(ExitCode::FAILURE);
        }
    };

    if !dry_run && let Some(dir) = &execution.execution_log_dir {
        log = log
            .with_jsonl_sink(dir, &doc.name())
            .context("Failed to open execution log")?;
    }

    let runner = Arc::new(ShellRunner::new(&config.project_root));
    let executor = PlanExecutor::new(execution, runner, Arc::new(log)).with_dry_run(dry_run);
    let report = executor.execute(&mut doc).await;

    if let Some(sink) = executor.log().sink_path() {
        info!(?sink, "cmd_run: execution log written");
    }
    debug!(success = report.success, "cmd_run: finished");
    Ok(ExitCode::from(report.exit_code()))
}

fn cmd_list(config: &Config) -> Result<ExitCode> {
    debug!(plans_dir = ?config.plans_dir, "cmd_list: called");
    let plans = match list_plans(&config.plans_dir) {
        Ok(Some(plans)) => plans,
        Ok(None) => {
            println!("No plans directory found.");
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Ok(fail(e)),
    };

    if plans.is_empty() {
        println!("No plans found.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("\nAvailable plans:\n");
    for plan in &plans {
        if let Some(name) = plan.file_name() {
            println!("  - {}", name.to_string_lossy());
        }
    }
    println!();
    Ok(ExitCode::SUCCESS)
}

fn cmd_new(config: &Config, template: PlanTemplate, name: &str, goal: &str) -> Result<ExitCode> {
    debug!(%template, %name, "cmd_new: called");
    let date = Local::now().format("%Y-%m-%d").to_string();
    match create_plan(&config.plans_dir, template, name, goal, &date) {
        Ok(path) => {
            println!("{} Created plan: {}", "[OK]".green(), path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(fail(e)),
    }
}

fn cmd_add_group(config: &Config, plan: &Path, name: &str, tasks: Vec<Task>) -> Result<ExitCode> {
    debug!(?plan, %name, "cmd_add_group: called");
    let path = config.resolve_plan_path(plan);
    let count = tasks.len();
    match add_group(&path, name, tasks) {
        Ok(_) => {
            println!(
                "{} Added group {} with {} tasks to {}",
                "[OK]".green(),
                name,
                count,
                path.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(fail(e)),
    }
}
