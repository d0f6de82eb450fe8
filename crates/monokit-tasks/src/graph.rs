//! Task dependency resolution

use std::collections::HashMap;

use tracing::{debug, instrument};

use monokit_core::config::TaskDefinition;

/// Errors during task graph resolution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Cyclic dependency detected at the named task
    #[error("Cyclic task dependency: {0}")]
    Cycle(String),

    /// Task not declared in `tasks.task_graph`
    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Flatten the requested tasks and their dependencies into execution order.
///
/// Depth-first, post-order: every dependency appears before its dependent,
/// dependencies are visited in their listed order, and a task requested more
/// than once appears only once.
#[instrument(skip(task_graph), fields(requested = task_ids.len()))]
pub fn resolve_task_order(
    task_ids: &[String],
    task_graph: &HashMap<String, TaskDefinition>,
) -> Result<Vec<String>, GraphError> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::new();

    for id in task_ids {
        visit(id, task_graph, &mut marks, &mut order)?;
    }

    debug!(order = ?order, "resolved task order");
    Ok(order)
}

fn visit<'a>(
    id: &'a str,
    task_graph: &'a HashMap<String, TaskDefinition>,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
) -> Result<(), GraphError> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => return Err(GraphError::Cycle(id.to_string())),
        None => {}
    }

    let task = task_graph
        .get(id)
        .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?;

    marks.insert(id, Mark::InProgress);
    for dep in &task.deps {
        visit(dep, task_graph, marks, order)?;
    }
    marks.insert(id, Mark::Done);
    order.push(id.to_string());
    Ok(())
}
