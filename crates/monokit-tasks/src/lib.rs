//! monokit Tasks - pipeline execution engine
//!
//! This crate runs pipelines across scopes: task graph resolution,
//! content-addressable caching, the container runner, the contracts and docs
//! task handlers, progress reporting and report files.

pub mod cache;
pub mod executor;
pub mod graph;
pub mod handlers;
pub mod report;
pub mod reporter;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheCheck, CacheError, CacheStats, TaskCache, TaskCacheEntry};
pub use executor::{
    build_command_args, execute_pipeline, PipelineError, PipelineRequest, ScopeRunResult, TaskRunResult,
};
pub use graph::{resolve_task_order, GraphError};
pub use handlers::{ContractsHandler, DocsHandler, HandlerTable, TaskContext, TaskHandler, TaskKind};
pub use report::{ReportStatus, ReportSummary, ReportWriter, ScopeReport, TaskReport};
pub use reporter::{CollectingReporter, FanoutReporter, PipelineEvent, PipelineReporter, TracingReporter};
pub use runner::{
    build_infra_args, ComposeRunner, ContainerRunner, ExecOutput, InfraAction, Redactor, TIMEOUT_EXIT_CODE,
};
