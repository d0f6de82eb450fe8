//! Pipeline execution reporting

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Events emitted while a pipeline runs
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Execution plan resolved
    PipelineStarted {
        pipeline: String,
        scopes: usize,
        tasks: Vec<String>,
        jobs: usize,
    },
    /// A worker picked up a scope
    ScopeStarted { scope: String },
    /// A task is about to run
    TaskStarted {
        scope: String,
        task: String,
        command: String,
    },
    /// A task succeeded, possibly from cache
    TaskCompleted {
        scope: String,
        task: String,
        duration: Duration,
        cached: bool,
    },
    /// A task exited non-zero; the rest of its scope is skipped
    TaskFailed {
        scope: String,
        task: String,
        exit_code: i32,
        duration: Duration,
    },
    /// A scope finished, successfully or not
    ScopeCompleted {
        scope: String,
        tasks: usize,
        success: bool,
    },
    /// Every scope finished
    AllCompleted {
        scopes: usize,
        failed: usize,
        cached: usize,
        duration: Duration,
    },
}

/// Trait for reporting pipeline progress
pub trait PipelineReporter: Send + Sync {
    /// Handle a pipeline event
    fn report(&self, event: &PipelineEvent);
}

/// Reporter that logs every event through tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::PipelineStarted {
                pipeline,
                scopes,
                tasks,
                jobs,
            } => {
                tracing::info!(pipeline = %pipeline, scopes, jobs, tasks = ?tasks, "pipeline started");
            }
            PipelineEvent::ScopeStarted { scope } => {
                tracing::debug!(scope = %scope, "scope started");
            }
            PipelineEvent::TaskStarted { scope, task, command } => {
                tracing::info!("[{}] {}: {}", scope, task, command);
            }
            PipelineEvent::TaskCompleted {
                scope,
                task,
                duration,
                cached,
            } => {
                if *cached {
                    tracing::info!("[{}] {} cached", scope, task);
                } else {
                    tracing::info!("[{}] {} completed in {:.1}s", scope, task, duration.as_secs_f64());
                }
            }
            PipelineEvent::TaskFailed {
                scope,
                task,
                exit_code,
                duration,
            } => {
                tracing::error!(
                    "[{}] {} failed with exit code {} after {:.1}s",
                    scope,
                    task,
                    exit_code,
                    duration.as_secs_f64()
                );
            }
            PipelineEvent::ScopeCompleted { scope, tasks, success } => {
                tracing::debug!(scope = %scope, tasks, success, "scope completed");
            }
            PipelineEvent::AllCompleted {
                scopes,
                failed,
                cached,
                duration,
            } => {
                tracing::info!(
                    "Pipeline complete: {} scopes, {} failed, {} cached ({:.1}s)",
                    scopes,
                    failed,
                    cached,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl PipelineReporter for CollectingReporter {
    fn report(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Forwards every event to several reporters
#[derive(Default)]
pub struct FanoutReporter {
    reporters: Vec<Arc<dyn PipelineReporter>>,
}

impl FanoutReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R: PipelineReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Arc::new(reporter));
        self
    }

    pub fn with_shared(mut self, reporter: Arc<dyn PipelineReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl PipelineReporter for FanoutReporter {
    fn report(&self, event: &PipelineEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> PipelineEvent {
        PipelineEvent::TaskStarted {
            scope: "back:service:alpha".to_string(),
            task: "build".to_string(),
            command: "pnpm -C back/services/alpha run build".to_string(),
        }
    }

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();
        reporter.report(&started());
        reporter.report(&PipelineEvent::TaskCompleted {
            scope: "back:service:alpha".to_string(),
            task: "build".to_string(),
            duration: Duration::from_secs(5),
            cached: false,
        });

        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], started());
    }

    #[test]
    fn test_tracing_reporter() {
        let reporter = TracingReporter;
        // Just verify it doesn't panic
        reporter.report(&started());
        reporter.report(&PipelineEvent::AllCompleted {
            scopes: 1,
            failed: 0,
            cached: 1,
            duration: Duration::from_millis(20),
        });
    }

    #[test]
    fn test_fanout() {
        let collecting = Arc::new(CollectingReporter::default());
        let fanout = FanoutReporter::new()
            .with(TracingReporter)
            .with_shared(collecting.clone());
        assert_eq!(fanout.len(), 2);

        fanout.report(&started());
        assert_eq!(collecting.events().len(), 1);
        assert!(FanoutReporter::new().is_empty());
    }
}
