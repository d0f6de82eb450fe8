//! Pipeline executor
//!
//! Resolves a pipeline to one task order, then runs that order against every
//! selected scope on a fixed pool of workers. Tasks inside a scope run one at a
//! time and stop at the first non-zero exit; other scopes are unaffected.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use monokit_core::config::{Executor, ProfileConfig, TaskDefinition};
use monokit_core::{Config, ConfigError, ErrorKind, MonokitError, RunnerError, ScopeRecord};

use crate::cache::{resolve_task_outputs, CacheCheck, CacheError, TaskCache, TaskCacheEntry};
use crate::graph::{resolve_task_order, GraphError};
use crate::handlers::{HandlerTable, TaskContext, TaskKind};
use crate::reporter::{PipelineEvent, PipelineReporter};
use crate::runner::{ContainerRunner, ExecOutput};

/// Result of one task on one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRunResult {
    pub scope_id: String,
    pub task_id: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Argument vector run, or `[task_id]` for handler tasks
    pub command: Vec<String>,
    /// Zero for cache hits and dry runs
    pub duration: Duration,
    pub cached: bool,
}

impl TaskRunResult {
    /// Whether the task exited with code 0
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Results of the tasks attempted on one scope, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRunResult {
    pub scope_id: String,
    pub tasks: Vec<TaskRunResult>,
}

impl ScopeRunResult {
    /// Whether every attempted task succeeded
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(TaskRunResult::is_success)
    }

    /// First failing task, if any
    pub fn failure(&self) -> Option<&TaskRunResult> {
        self.tasks.iter().find(|t| !t.is_success())
    }
}

/// Errors that abort or fail a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Core(#[from] MonokitError),

    /// At least one task exited non-zero. `task` is the first failure in
    /// scope order; `results` holds every scope's results.
    #[error("Task {} failed on scope {} with exit code {}", .task.task_id, .task.scope_id, .task.exit_code)]
    TaskFailed {
        task: Box<TaskRunResult>,
        results: Vec<ScopeRunResult>,
    },

    /// A worker panicked or was cancelled
    #[error("Pipeline worker failed: {0}")]
    Join(String),
}

impl PipelineError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Graph(_) => ErrorKind::InvalidConfig,
            Self::Cache(_) | Self::Join(_) => ErrorKind::Io,
            Self::Runner(e) => e.kind(),
            Self::Core(e) => e.kind(),
            Self::TaskFailed { .. } => ErrorKind::TaskFailed,
        }
    }

    /// Scope results gathered before the failure, if the pipeline ran to completion
    pub fn results(&self) -> Option<&[ScopeRunResult]> {
        match self {
            Self::TaskFailed { results, .. } => Some(results),
            _ => None,
        }
    }
}

/// One pipeline invocation
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub repo_root: PathBuf,
    pub pipeline: String,
    /// Scopes to run against, in report order
    pub scopes: Vec<ScopeRecord>,
    pub config: Arc<Config>,
    /// Build commands without running anything or touching the cache
    pub dry_run: bool,
}

impl PipelineRequest {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        pipeline: impl Into<String>,
        scopes: Vec<ScopeRecord>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            pipeline: pipeline.into(),
            scopes,
            config,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Wrap a task command in its profile's executor convention
pub fn build_command_args(scope: &ScopeRecord, profile: &ProfileConfig, task: &TaskDefinition) -> Vec<String> {
    let mut args = match profile.executor {
        Executor::Pnpm => vec!["pnpm".to_string(), "-C".to_string(), scope.path.clone()],
        Executor::Maven => vec![
            "mvn".to_string(),
            "-pl".to_string(),
            scope.path.clone(),
            "-am".to_string(),
        ],
        Executor::Custom => Vec::new(),
    };
    args.extend(profile.base_args.iter().cloned());
    args.extend(task.command.iter().cloned());
    args
}

struct Shared {
    request: PipelineRequest,
    order: Vec<String>,
    runner: Arc<dyn ContainerRunner>,
    handlers: Arc<HandlerTable>,
    reporter: Arc<dyn PipelineReporter>,
    cache: TaskCache,
    queue: Mutex<VecDeque<(usize, ScopeRecord)>>,
    abort: AtomicBool,
}

impl Shared {
    fn next_scope(&self) -> Option<(usize, ScopeRecord)> {
        if self.abort.load(Ordering::SeqCst) {
            return None;
        }
        self.queue.lock().ok()?.pop_front()
    }
}

type WorkerOutcome = (Vec<(usize, ScopeRunResult)>, Option<PipelineError>);

/// Run `request.pipeline` against every scope in `request.scopes`.
///
/// Returns the per-scope results in scope order. If any task failed, returns
/// [`PipelineError::TaskFailed`] naming the first failure in that order. The
/// task cache is saved once all workers have stopped, also when a hard error
/// aborted the run.
#[instrument(skip_all, fields(pipeline = %request.pipeline, scopes = request.scopes.len(), dry_run = request.dry_run))]
pub async fn execute_pipeline(
    request: PipelineRequest,
    runner: Arc<dyn ContainerRunner>,
    handlers: Arc<HandlerTable>,
    reporter: Arc<dyn PipelineReporter>,
) -> Result<Vec<ScopeRunResult>, PipelineError> {
    let started = Instant::now();
    let config = request.config.clone();

    let cache = if request.dry_run {
        TaskCache::empty(&request.repo_root)
    } else {
        TaskCache::load(&request.repo_root)
    };

    let requested = config
        .tasks
        .pipelines
        .get(&request.pipeline)
        .ok_or_else(|| ConfigError::UnknownPipeline(request.pipeline.clone()))?;
    let order = resolve_task_order(requested, &config.tasks.task_graph)?;

    for scope in &request.scopes {
        if !config.tasks.profiles.contains_key(&scope.profile) {
            return Err(ConfigError::UnknownProfile(scope.profile.clone()).into());
        }
    }

    let jobs = config.tasks.jobs.max(1);
    reporter.report(&PipelineEvent::PipelineStarted {
        pipeline: request.pipeline.clone(),
        scopes: request.scopes.len(),
        tasks: order.clone(),
        jobs,
    });

    let queue: VecDeque<(usize, ScopeRecord)> = request.scopes.iter().cloned().enumerate().collect();
    let scope_count = queue.len();
    let dry_run = request.dry_run;
    let shared = Arc::new(Shared {
        request,
        order,
        runner,
        handlers,
        reporter,
        cache,
        queue: Mutex::new(queue),
        abort: AtomicBool::new(false),
    });

    let mut workers = JoinSet::new();
    for worker in 0..jobs.min(scope_count.max(1)) {
        let shared = shared.clone();
        workers.spawn(async move { run_worker(worker, shared).await });
    }

    let mut indexed = Vec::with_capacity(scope_count);
    let mut hard_error = None;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((results, err)) => {
                indexed.extend(results);
                if hard_error.is_none() {
                    hard_error = err;
                }
            }
            Err(e) => {
                shared.abort.store(true, Ordering::SeqCst);
                if hard_error.is_none() {
                    hard_error = Some(PipelineError::Join(e.to_string()));
                }
            }
        }
    }

    let save_result = if dry_run { Ok(()) } else { shared.cache.save() };

    if let Some(err) = hard_error {
        if let Err(save_err) = save_result {
            warn!(error = %save_err, "failed to save task cache");
        }
        error!(error = %err, "pipeline aborted");
        return Err(err);
    }
    save_result?;

    indexed.sort_by_key(|(idx, _)| *idx);
    let results: Vec<ScopeRunResult> = indexed.into_iter().map(|(_, r)| r).collect();

    let failed = results.iter().filter(|r| !r.is_success()).count();
    let cached = results
        .iter()
        .flat_map(|r| r.tasks.iter())
        .filter(|t| t.cached)
        .count();
    shared.reporter.report(&PipelineEvent::AllCompleted {
        scopes: results.len(),
        failed,
        cached,
        duration: started.elapsed(),
    });

    if let Some(first) = results.iter().find_map(ScopeRunResult::failure) {
        let task = Box::new(first.clone());
        info!(failed, "pipeline finished with failures");
        return Err(PipelineError::TaskFailed { task, results });
    }

    info!(scopes = results.len(), cached, "pipeline finished");
    Ok(results)
}

async fn run_worker(worker: usize, shared: Arc<Shared>) -> WorkerOutcome {
    let mut results = Vec::new();
    while let Some((idx, scope)) = shared.next_scope() {
        debug!(worker, scope = %scope.id, "worker picked scope");
        match run_scope(&shared, &scope).await {
            Ok(result) => results.push((idx, result)),
            Err(e) => {
                shared.abort.store(true, Ordering::SeqCst);
                return (results, Some(e));
            }
        }
    }
    (results, None)
}

async fn run_scope(shared: &Shared, scope: &ScopeRecord) -> Result<ScopeRunResult, PipelineError> {
    let config = &shared.request.config;
    let profile = config
        .tasks
        .profiles
        .get(&scope.profile)
        .ok_or_else(|| ConfigError::UnknownProfile(scope.profile.clone()))?;

    shared.reporter.report(&PipelineEvent::ScopeStarted {
        scope: scope.id.clone(),
    });

    let mut tasks = Vec::with_capacity(shared.order.len());
    for task_id in &shared.order {
        let task = config
            .tasks
            .task_graph
            .get(task_id)
            .ok_or_else(|| GraphError::UnknownTask(task_id.clone()))?;

        let result = run_task(shared, scope, profile, task_id, task).await?;
        let success = result.is_success();
        if success {
            shared.reporter.report(&PipelineEvent::TaskCompleted {
                scope: scope.id.clone(),
                task: task_id.clone(),
                duration: result.duration,
                cached: result.cached,
            });
        } else {
            shared.reporter.report(&PipelineEvent::TaskFailed {
                scope: scope.id.clone(),
                task: task_id.clone(),
                exit_code: result.exit_code,
                duration: result.duration,
            });
        }
        tasks.push(result);
        if !success {
            break;
        }
    }

    let result = ScopeRunResult {
        scope_id: scope.id.clone(),
        tasks,
    };
    shared.reporter.report(&PipelineEvent::ScopeCompleted {
        scope: scope.id.clone(),
        tasks: result.tasks.len(),
        success: result.is_success(),
    });
    Ok(result)
}

async fn run_task(
    shared: &Shared,
    scope: &ScopeRecord,
    profile: &ProfileConfig,
    task_id: &str,
    task: &TaskDefinition,
) -> Result<TaskRunResult, PipelineError> {
    let request = &shared.request;
    let kind = TaskKind::of(task_id);
    let command = match kind {
        TaskKind::Generic => build_command_args(scope, profile, task),
        TaskKind::Contracts | TaskKind::Docs => vec![task_id.to_string()],
    };
    let finish = |output: ExecOutput, duration: Duration, cached: bool| TaskRunResult {
        scope_id: scope.id.clone(),
        task_id: task_id.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        command: command.clone(),
        duration,
        cached,
    };

    if request.dry_run {
        return Ok(finish(ExecOutput::success(command.join(" ")), Duration::ZERO, false));
    }

    shared.reporter.report(&PipelineEvent::TaskStarted {
        scope: scope.id.clone(),
        task: task_id.to_string(),
        command: command.join(" "),
    });
    let start = Instant::now();

    if kind != TaskKind::Generic {
        let handler = shared
            .handlers
            .get(kind)
            .ok_or_else(|| ConfigError::UnsupportedTask(task_id.to_string()))?;
        let ctx = TaskContext {
            repo_root: &request.repo_root,
            config: &request.config,
            scope,
            task_id,
            runner: shared.runner.as_ref(),
        };
        let output = handler.run(&ctx).await?;
        return Ok(finish(output, start.elapsed(), false));
    }

    let miss_hash = match shared.cache.check(scope, task_id, task)? {
        CacheCheck::Hit => {
            return Ok(finish(ExecOutput::success("cached"), Duration::ZERO, true));
        }
        CacheCheck::Miss { hash } => Some(hash),
        CacheCheck::Uncacheable => None,
    };

    let env: HashMap<String, String> = task.env.clone();
    let output = shared.runner.run(&command, &env).await?;
    let duration = start.elapsed();

    if output.is_success() {
        if let Some(input_hash) = miss_hash {
            let outputs = resolve_task_outputs(&request.repo_root, scope, task)?;
            debug!(scope = %scope.id, task = task_id, outputs = outputs.len(), "recording cache entry");
            shared
                .cache
                .record(&scope.id, task_id, TaskCacheEntry { input_hash, outputs });
        }
    }

    Ok(finish(output, duration, false))
}
