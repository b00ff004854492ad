//! Plan executor
//!
//! Drives a plan run: status transitions, context loading, then dependency
//! ordered batches of groups. A batch of one runs inline; larger batches run
//! on spawned tasks and share a cancellation token tripped by the first failure.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::deps::{ready_groups, resolve_dependencies, validate_dependency_graph};
use super::report::{RunReport, summary};
use crate::config::ExecutionConfig;
use crate::domain::{PlanDocument, PlanStatus, TaskGroup, TaskStatus};
use crate::error::PlanError;
use crate::events::{ExecutionLog, LogEntry};
use crate::runner::{CommandRunner, TaskOutcome, TaskRunner};
use crate::writer::{persist_checklist, persist_status};

/// How a single group run ended
#[derive(Debug)]
pub enum GroupOutcome {
    Completed,
    Failed(PlanError),
    /// Cancellation observed; the group is `pending` or `skipped`
    Cancelled,
}

/// Run a group's tasks in order, stopping at the first failure
///
/// Tasks already in a terminal state are not re-run. The group is returned
/// with its final status so spawned workers can hand it back.
pub async fn execute_group(
    mut group: TaskGroup,
    tasks: &TaskRunner,
    cancel: &CancellationToken,
) -> (TaskGroup, GroupOutcome) {
    debug!(group = %group.name, tasks = group.tasks.len(), "execute_group: called");
    if cancel.is_cancelled() {
        debug!(group = %group.name, "execute_group: cancelled before start");
        return (group, GroupOutcome::Cancelled);
    }

    let log = tasks.log();
    log.info(format!("Executing group: {}", group.name));
    group.status = TaskStatus::InProgress;

    for i in 0..group.tasks.len() {
        if group.tasks[i].is_terminal() {
            debug!(task = %group.tasks[i].id, "execute_group: task already terminal");
            continue;
        }

        match tasks.run_task(&mut group.tasks[i], cancel).await {
            TaskOutcome::Completed => {}
            TaskOutcome::Failed(e) => {
                group.status = TaskStatus::Failed;
                log.error(format!("Group {} failed: {}", group.name, e));
                return (group, GroupOutcome::Failed(e));
            }
            TaskOutcome::Cancelled => {
                group.status = if group.completed_tasks() > 0 {
                    TaskStatus::Skipped
                } else {
                    TaskStatus::Pending
                };
                log.warn(format!("Group {} cancelled", group.name));
                return (group, GroupOutcome::Cancelled);
            }
        }
    }

    group.status = TaskStatus::Completed;
    log.success(format!("Completed group: {}", group.name));
    (group, GroupOutcome::Completed)
}

/// Executes plan documents
pub struct PlanExecutor {
    config: ExecutionConfig,
    runner: Arc<dyn CommandRunner>,
    tasks: Arc<TaskRunner>,
    log: Arc<ExecutionLog>,
    dry_run: bool,
}

impl PlanExecutor {
    /// Create an executor that runs commands through `runner`
    pub fn new(config: ExecutionConfig, runner: Arc<dyn CommandRunner>, log: Arc<ExecutionLog>) -> Self {
        debug!(?config, "PlanExecutor::new: called");
        let tasks = Arc::new(TaskRunner::new(runner.clone(), &config, log.clone()));
        Self {
            config,
            runner,
            tasks,
            log,
            dry_run: false,
        }
    }

    /// Only print the summary; run nothing and write nothing
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The execution log this executor records to
    pub fn log(&self) -> &Arc<ExecutionLog> {
        &self.log
    }

    /// Run a parsed plan to completion or first failure
    ///
    /// Groups are chained in document order before scheduling. The plan
    /// status is persisted as IN_PROGRESS, then COMPLETED or FAILED.
    pub async fn execute(&self, doc: &mut PlanDocument) -> RunReport {
        info!(plan = %doc.name(), dry_run = self.dry_run, "PlanExecutor::execute: called");
        let start = self.log.entries().len();
        self.log.info(format!("Starting execution of plan: {}", doc.name()));
        self.log.detail(summary(doc));

        if self.dry_run {
            self.log.info("DRY RUN MODE - No changes will be made");
            return RunReport::from_document(doc, None, self.entries_since(start));
        }

        let result = match persist_status(doc, PlanStatus::InProgress) {
            Ok(_) => {
                self.load_context(doc).await;
                resolve_dependencies(&mut doc.groups);
                self.run_groups(&mut doc.groups).await
            }
            Err(e) => {
                self.log.error(format!("Failed to update plan status: {}", e));
                Err(e)
            }
        };

        if self.config.mark_steps
            && let Err(e) = persist_checklist(doc)
        {
            self.log.warn(format!("Failed to update step checklist: {}", e));
        }

        self.finish(doc, result, start)
    }

    fn finish(&self, doc: &mut PlanDocument, result: Result<(), PlanError>, start: usize) -> RunReport {
        let status = if result.is_ok() {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };

        let mut error = result.err();
        if let Err(e) = persist_status(doc, status) {
            self.log.error(format!("Failed to update plan status: {}", e));
            error.get_or_insert(e);
        }

        match &error {
            None => self.log.success("Plan execution completed successfully!"),
            Some(e) => {
                error!(plan = %doc.name(), error = %e, "PlanExecutor::execute: plan failed");
                self.log.error("Plan execution failed. Check logs for details.");
            }
        }

        RunReport::from_document(doc, error, self.entries_since(start))
    }

    fn entries_since(&self, start: usize) -> Vec<LogEntry> {
        self.log.entries().into_iter().skip(start).collect()
    }

    /// Run context-loading commands; failures are logged and ignored
    async fn load_context(&self, doc: &PlanDocument) {
        if doc.context_loading.is_empty() {
            return;
        }
        debug!(commands = doc.context_loading.len(), "PlanExecutor::load_context: called");
        self.log.info("Loading context...");

        let timeout = self.config.context_timeout();
        for command in &doc.context_loading {
            self.log.detail(format!("  $ {}", command));
            match self.runner.run(command, timeout).await {
                Ok(output) if output.success() => {}
                Ok(output) => self
                    .log
                    .warn(format!("Context command failed: {}: {}", command, output.failure_detail())),
                Err(e) => self.log.warn(format!("Context command failed: {}: {}", command, e)),
            }
        }
    }

    /// Schedule groups by their dependency sets until all complete or one fails
    pub async fn run_groups(&self, groups: &mut [TaskGroup]) -> Result<(), PlanError> {
        debug!(groups = groups.len(), "PlanExecutor::run_groups: called");
        if let Err(cycle) = validate_dependency_graph(groups) {
            let err = PlanError::CircularDependency {
                detail: cycle.join(" -> "),
            };
            self.log.error(err.to_string());
            return Err(err);
        }

        let batch_size = self.config.effective_batch_size();
        let max_iterations = groups.len() * 2;
        let mut completed: HashSet<String> = groups
            .iter()
            .filter(|g| g.status == TaskStatus::Completed)
            .map(|g| g.name.clone())
            .collect();
        let mut iteration = 0;

        while completed.len() < groups.len() {
            if iteration >= max_iterations {
                let err = PlanError::CircularDependency {
                    detail: format!("maximum iterations ({}) reached", max_iterations),
                };
                self.log.error(err.to_string());
                return Err(err);
            }

            let ready = ready_groups(groups, &completed);
            if ready.is_empty() {
                let pending = groups
                    .iter()
                    .filter(|g| !completed.contains(&g.name))
                    .map(|g| g.name.clone())
                    .collect();
                let err = PlanError::UnmetDependency { pending };
                self.log.error(err.to_string());
                return Err(err);
            }

            let batch: Vec<usize> = ready.into_iter().take(batch_size).collect();
            debug!(iteration, ?batch, "PlanExecutor::run_groups: running batch");
            let result = if let &[idx] = batch.as_slice() {
                self.run_single(groups, idx).await
            } else {
                self.run_parallel(groups, &batch).await
            };

            for &idx in &batch {
                if groups[idx].status == TaskStatus::Completed {
                    completed.insert(groups[idx].name.clone());
                }
            }
            result?;
            iteration += 1;
        }

        Ok(())
    }

    async fn run_single(&self, groups: &mut [TaskGroup], idx: usize) -> Result<(), PlanError> {
        let cancel = CancellationToken::new();
        let (group, outcome) = execute_group(groups[idx].clone(), &self.tasks, &cancel).await;
        groups[idx] = group;
        match outcome {
            GroupOutcome::Failed(e) => Err(e),
            GroupOutcome::Completed | GroupOutcome::Cancelled => Ok(()),
        }
    }

    async fn run_parallel(&self, groups: &mut [TaskGroup], batch: &[usize]) -> Result<(), PlanError> {
        self.log.info(format!("Executing {} groups in parallel...", batch.len()));
        let cancel = CancellationToken::new();

        let mut running: FuturesUnordered<_> = batch
            .iter()
            .map(|&idx| {
                let group = groups[idx].clone();
                let tasks = self.tasks.clone();
                let cancel = cancel.clone();
                let handle = tokio::spawn(async move { execute_group(group, &tasks, &cancel).await });
                async move { (idx, handle.await) }
            })
            .collect();

        // Drain every worker so each group's final state is written back
        let mut first_error = None;
        while let Some((idx, joined)) = running.next().await {
            let failure = match joined {
                Ok((group, outcome)) => {
                    groups[idx] = group;
                    match outcome {
                        GroupOutcome::Failed(e) => Some(e),
                        GroupOutcome::Completed | GroupOutcome::Cancelled => None,
                    }
                }
                Err(e) => {
                    let name = groups[idx].name.clone();
                    warn!(group = %name, error = %e, "PlanExecutor::run_parallel: worker panicked");
                    self.log.error(format!("Group {} failed with exception: {}", name, e));
                    groups[idx].status = TaskStatus::Failed;
                    Some(PlanError::WorkerPanicked {
                        group: name,
                        detail: e.to_string(),
                    })
                }
            };

            if let Some(e) = failure {
                if !cancel.is_cancelled() {
                    debug!("PlanExecutor::run_parallel: cancelling remaining groups");
                    cancel.cancel();
                }
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use crate::error::RunnerError;
    use crate::events::LogLevel;
    use crate::parser::parse_plan;
    use crate::runner::CommandOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Succeeds unless the command contains "fail"; "slow" commands take 50ms
    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, command: &str, _timeout: Duration) -> Result<CommandOutput, RunnerError> {
            self.calls.lock().unwrap().push(command.to_string());
            if command.contains("slow") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let failed = command.contains("fail");
            Ok(CommandOutput {
                exit_code: i32::from(failed),
                stdout: String::new(),
                stderr: if failed { "failed".to_string() } else { String::new() },
                duration_ms: 0,
            })
        }
    }

    fn executor(runner: Arc<ScriptedRunner>) -> PlanExecutor {
        PlanExecutor::new(ExecutionConfig::default(), runner, Arc::new(ExecutionLog::silent()))
    }

    fn group(name: &str, verifies: &[&str]) -> TaskGroup {
        let mut group = TaskGroup::new(name);
        for (i, verify) in verifies.iter().enumerate() {
            group.add_task(Task::new(i as u32 + 1, format!("{} {}", name, i + 1)).with_verify(*verify));
        }
        group
    }

    const PLAN: &str = "> **Status:** DRAFT\n\n## Context Loading\n```bash\ngit status\n```\n\n## Tasks\n### Task 1: Setup\n**Verify:** `true setup`\n\n### Backend\n### Task 2: Api\n**Verify:** `true api`\n";

    #[tokio::test]
    async fn test_execute_group_runs_in_order() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let (group, outcome) =
            execute_group(group("A", &["one", "two"]), &exec.tasks, &CancellationToken::new()).await;

        assert!(matches!(outcome, GroupOutcome::Completed));
        assert_eq!(group.status, TaskStatus::Completed);
        assert_eq!(runner.calls(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_execute_group_stops_at_failure() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let (group, outcome) =
            execute_group(group("A", &["fail one", "two"]), &exec.tasks, &CancellationToken::new()).await;

        assert!(matches!(outcome, GroupOutcome::Failed(PlanError::VerifyFailed { .. })));
        assert_eq!(group.status, TaskStatus::Failed);
        assert_eq!(group.tasks[0].status, TaskStatus::Failed);
        assert_eq!(group.tasks[1].status, TaskStatus::Pending);
        assert_eq!(runner.calls(), vec!["fail one"]);
    }

    #[tokio::test]
    async fn test_execute_group_skips_terminal_tasks() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let mut group = group("A", &["one", "two"]);
        group.tasks[0].status = TaskStatus::Completed;

        let (group, _) = execute_group(group, &exec.tasks, &CancellationToken::new()).await;
        assert_eq!(group.status, TaskStatus::Completed);
        assert_eq!(runner.calls(), vec!["two"]);
    }

    #[tokio::test]
    async fn test_execute_group_empty_completes() {
        let exec = executor(Arc::new(ScriptedRunner::default()));
        let (group, outcome) = execute_group(TaskGroup::new("Empty"), &exec.tasks, &CancellationToken::new()).await;

        assert!(matches!(outcome, GroupOutcome::Completed));
        assert_eq!(group.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_execute_group_cancelled_before_start_stays_pending() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (group, outcome) = execute_group(group("A", &["one"]), &exec.tasks, &cancel).await;
        assert!(matches!(outcome, GroupOutcome::Cancelled));
        assert_eq!(group.status, TaskStatus::Pending);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_groups_chain_aborts_on_failure() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let mut groups = vec![group("A", &["a"]), group("B", &["fail b"]), group("C", &["c"])];
        resolve_dependencies(&mut groups);

        let result = exec.run_groups(&mut groups).await;

        assert!(matches!(result, Err(PlanError::VerifyFailed { .. })));
        assert_eq!(groups[0].status, TaskStatus::Completed);
        assert_eq!(groups[1].status, TaskStatus::Failed);
        assert_eq!(groups[2].status, TaskStatus::Pending);
        assert_eq!(runner.calls(), vec!["a", "fail b"]);
    }

    #[tokio::test]
    async fn test_run_groups_unmet_dependency() {
        let exec = executor(Arc::new(ScriptedRunner::default()));
        let mut groups = vec![group("A", &["a"]), group("B", &["b"])];
        groups[1].add_dependency("Missing");

        let result = exec.run_groups(&mut groups).await;

        match result {
            Err(PlanError::UnmetDependency { pending }) => assert_eq!(pending, vec!["B"]),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(groups[0].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_run_groups_cycle() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let mut groups = vec![group("A", &["a"]), group("B", &["b"])];
        resolve_dependencies(&mut groups);
        groups[0].add_dependency("B");

        let result = exec.run_groups(&mut groups).await;

        assert!(matches!(result, Err(PlanError::CircularDependency { .. })));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_groups_parallel_failure_keeps_sibling_state() {
        let exec = executor(Arc::new(ScriptedRunner::default()));
        let mut groups = vec![group("A", &["a"]), group("B", &["slow fail b"])];

        let result = exec.run_groups(&mut groups).await;

        assert!(matches!(result, Err(PlanError::VerifyFailed { .. })));
        assert_eq!(groups[0].status, TaskStatus::Completed);
        assert_eq!(groups[1].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_groups_sibling_failure_skips_partial_group() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let mut groups = vec![group("A", &["slow a", "second a"]), group("B", &["fail b"])];

        let result = exec.run_groups(&mut groups).await;

        assert!(matches!(result, Err(PlanError::VerifyFailed { .. })));
        assert_eq!(groups[0].status, TaskStatus::Skipped);
        assert_eq!(groups[0].tasks[0].status, TaskStatus::Completed);
        assert_eq!(groups[0].tasks[1].status, TaskStatus::Pending);
        assert_eq!(groups[1].status, TaskStatus::Failed);
        assert!(!runner.calls().contains(&"second a".to_string()));
    }

    #[tokio::test]
    async fn test_execute_in_memory_plan() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let mut doc = parse_plan(PLAN).unwrap();

        let report = exec.execute(&mut doc).await;

        assert!(report.success, "{:?}", report.error);
        assert_eq!(report.final_status, PlanStatus::Completed);
        assert_eq!(report.completed_groups, vec!["General", "Backend"]);
        assert!(doc.raw.contains("> **Status:** COMPLETED"));
        assert_eq!(runner.calls(), vec!["git status", "true setup", "true api"]);
        assert_eq!(doc.groups[1].dependencies.iter().collect::<Vec<_>>(), vec!["General"]);
    }

    #[tokio::test]
    async fn test_execute_context_failure_is_advisory() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone());
        let mut doc = parse_plan(&PLAN.replace("git status", "git fail")).unwrap();

        let report = exec.execute(&mut doc).await;

        assert!(report.success);
        assert!(
            report
                .log
                .iter()
                .any(|e| e.level == LogLevel::Warn && e.message.contains("git fail"))
        );
    }

    #[tokio::test]
    async fn test_execute_failure_marks_failed() {
        let exec = executor(Arc::new(ScriptedRunner::default()));
        let mut doc = parse_plan(&PLAN.replace("true api", "fail api")).unwrap();

        let report = exec.execute(&mut doc).await;

        assert!(!report.success);
        assert_eq!(report.final_status, PlanStatus::Failed);
        assert_eq!(report.failed_groups, vec!["Backend"]);
        assert!(doc.raw.contains("> **Status:** FAILED"));
        assert_eq!(doc.groups[1].tasks[0].error.as_deref(), Some("failed"));
    }

    #[tokio::test]
    async fn test_execute_dry_run_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(runner.clone()).with_dry_run(true);
        let mut doc = parse_plan(PLAN).unwrap();

        let report = exec.execute(&mut doc).await;

        assert!(report.success);
        assert_eq!(report.final_status, PlanStatus::Draft);
        assert_eq!(doc.raw, PLAN);
        assert!(runner.calls().is_empty());
    }
}
