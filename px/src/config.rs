//! planexec configuration types and loading

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main planexec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding plan files; relative plan paths resolve here
    #[serde(rename = "plans-dir")]
    pub plans_dir: PathBuf,

    /// Working directory for every executed command
    #[serde(rename = "project-root")]
    pub project_root: PathBuf,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Executor settings
    pub execution: ExecutionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plans_dir: PathBuf::from("plans"),
            project_root: PathBuf::from("."),
            log_level: None,
            execution: ExecutionConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must load. Otherwise the first readable file from
    /// [`Config::search_paths`] wins, and defaults apply when none exists.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "Config::load: called");
        if let Some(path) = config_path {
            return Self::load_from_file(path).wrap_err_with(|| format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths().into_iter().filter(|p| p.exists()) {
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => warn!(path = %candidate.display(), error = %e, "Config::load: skipping unreadable config"),
            }
        }

        debug!("Config::load: no config file found, using defaults");
        Ok(Self::default())
    }

    /// Config files consulted without `--config`, project-local first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".planexec.yml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("planexec").join("planexec.yml"));
        }
        paths
    }

    /// Read only the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).wrap_err("Failed to read config file")?;
        let config = serde_yaml::from_str(&content).wrap_err("Failed to parse config file")?;
        info!(path = %path.display(), "Config::load_from_file: loaded");
        Ok(config)
    }

    /// Resolve a plan argument: absolute paths as-is, bare names under `plans-dir`
    pub fn resolve_plan_path(&self, plan: &Path) -> PathBuf {
        if plan.is_absolute() || plan.exists() {
            plan.to_path_buf()
        } else {
            self.plans_dir.join(plan)
        }
    }
}

/// Executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum number of groups run concurrently in one batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Timeout for step and verify commands in seconds
    #[serde(rename = "command-timeout-secs")]
    pub command_timeout_secs: u64,

    /// Timeout for context-loading commands in seconds
    #[serde(rename = "context-timeout-secs")]
    pub context_timeout_secs: u64,

    /// Leading words that make a step executable
    #[serde(rename = "command-prefixes")]
    pub command_prefixes: Vec<String>,

    /// Also tick the step checklist of completed tasks
    #[serde(rename = "mark-steps")]
    pub mark_steps: bool,

    /// Directory for JSONL execution logs; disabled when unset
    #[serde(rename = "execution-log-dir")]
    pub execution_log_dir: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            command_timeout_secs: 60,
            context_timeout_secs: 30,
            command_prefixes: ["$", "git", "npm", "python", "cargo", "make", "sh", "bash"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            mark_steps: false,
            execution_log_dir: None,
        }
    }
}

impl ExecutionConfig {
    /// Batch size, never below one
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Step/verify timeout as a Duration
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Context-loading timeout as a Duration
    pub fn context_timeout(&self) -> Duration {
        Duration::from_secs(self.context_timeout_secs)
    }
}
