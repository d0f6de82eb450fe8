//! Task kinds and the handlers that run non-generic tasks
//!
//! Task ids under a reserved namespace (`contracts:`, `docs:`) are not turned
//! into a profile-wrapped command. They are resolved to a [`TaskKind`] once and
//! dispatched to the [`TaskHandler`] registered for that kind.

mod contracts;
mod docs;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use monokit_core::{Config, ScopeRecord};

use crate::runner::{ContainerRunner, ExecOutput};

pub use contracts::ContractsHandler;
pub use docs::DocsHandler;

/// How a task id is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Profile-wrapped command from the task graph
    Generic,
    /// OpenAPI contract task (`contracts:*`)
    Contracts,
    /// Documentation site task (`docs:*`)
    Docs,
}

impl TaskKind {
    /// Classify a task id by its namespace
    pub fn of(task_id: &str) -> Self {
        if task_id.starts_with("contracts:") {
            Self::Contracts
        } else if task_id.starts_with("docs:") {
            Self::Docs
        } else {
            Self::Generic
        }
    }

    /// Returns the string representation of the task kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Contracts => "contracts",
            Self::Docs => "docs",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a handler needs to run one task on one scope
pub struct TaskContext<'a> {
    /// Repository root
    pub repo_root: &'a Path,
    /// Full configuration
    pub config: &'a Config,
    /// Scope the task runs against
    pub scope: &'a ScopeRecord,
    /// Task id, including its namespace
    pub task_id: &'a str,
    /// Runner for container commands
    pub runner: &'a dyn ContainerRunner,
}

/// Runs the tasks of one [`TaskKind`].
///
/// Handlers report a failing command through the returned exit code. An `Err`
/// means the task could not be attempted (bad configuration, missing files,
/// git or runner failures) and aborts the pipeline.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run `ctx.task_id` against `ctx.scope`
    async fn run(&self, ctx: &TaskContext<'_>) -> monokit_core::Result<ExecOutput>;
}

/// Dispatch table from task kind to handler
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl HandlerTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the contracts and docs handlers.
    ///
    /// `ci_base_ref` is the base branch reported by the CI environment, used
    /// by `contracts:breaking`.
    pub fn standard(ci_base_ref: Option<String>) -> Self {
        Self::new()
            .with_handler(TaskKind::Contracts, ContractsHandler::new(ci_base_ref))
            .with_handler(TaskKind::Docs, DocsHandler)
    }

    /// Register `handler` for `kind`
    pub fn with_handler(mut self, kind: TaskKind, handler: impl TaskHandler + 'static) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    /// Handler registered for `kind`
    pub fn get(&self, kind: TaskKind) -> Option<&dyn TaskHandler> {
        self.handlers.get(&kind).map(|h| h.as_ref())
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(TaskKind::as_str).collect();
        kinds.sort();
        f.debug_struct("HandlerTable").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_of() {
        assert_eq!(TaskKind::of("contracts:lint"), TaskKind::Contracts);
        assert_eq!(TaskKind::of("docs:build"), TaskKind::Docs);
        assert_eq!(TaskKind::of("build"), TaskKind::Generic);
        assert_eq!(TaskKind::of("contracts"), TaskKind::Generic);
    }

    #[test]
    fn test_standard_table() {
        let table = HandlerTable::standard(None);
        assert!(table.get(TaskKind::Contracts).is_some());
        assert!(table.get(TaskKind::Docs).is_some());
        assert!(table.get(TaskKind::Generic).is_none());
        assert!(HandlerTable::new().get(TaskKind::Docs).is_none());
    }
}
