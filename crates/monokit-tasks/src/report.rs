//! Pipeline reports written under `.cache/monokit/reports/`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use monokit_core::config::CACHE_ROOT;

use crate::executor::{ScopeRunResult, TaskRunResult};

const ERROR_EXCERPT_CHARS: usize = 500;

static UNSAFE_SEGMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("Invalid regex"));

/// Overall outcome of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Failed,
}

/// Report entry for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub id: String,
    pub exit_code: i32,
    pub command: Vec<String>,
    pub duration_ms: u64,
    pub cached: bool,
    /// Start of stderr for failed tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_excerpt: Option<String>,
}

impl From<&TaskRunResult> for TaskReport {
    fn from(result: &TaskRunResult) -> Self {
        let error_excerpt = (!result.is_success())
            .then(|| result.stderr.chars().take(ERROR_EXCERPT_CHARS).collect::<String>());
        Self {
            id: result.task_id.clone(),
            exit_code: result.exit_code,
            command: result.command.clone(),
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            cached: result.cached,
            error_excerpt,
        }
    }
}

/// Report for one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeReport {
    pub id: String,
    pub tasks: Vec<TaskReport>,
}

impl From<&ScopeRunResult> for ScopeReport {
    fn from(result: &ScopeRunResult) -> Self {
        Self {
            id: result.scope_id.clone(),
            tasks: result.tasks.iter().map(TaskReport::from).collect(),
        }
    }
}

/// Report for a whole pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub pipeline: String,
    pub status: ReportStatus,
    pub generated_at: DateTime<Utc>,
    pub scopes: Vec<ScopeReport>,
}

impl ReportSummary {
    /// Summarize `results`; the status is failed if any task exited non-zero
    pub fn from_results(pipeline: impl Into<String>, results: &[ScopeRunResult]) -> Self {
        let status = if results.iter().all(ScopeRunResult::is_success) {
            ReportStatus::Success
        } else {
            ReportStatus::Failed
        };
        Self {
            pipeline: pipeline.into(),
            status,
            generated_at: Utc::now(),
            scopes: results.iter().map(ScopeReport::from).collect(),
        }
    }
}

/// Replace every character outside `[a-zA-Z0-9_-]` with `_`
pub fn sanitize_segment(value: &str) -> String {
    UNSAFE_SEGMENT_REGEX.replace_all(value, "_").into_owned()
}

/// Writes reports and task logs for one repository
#[derive(Debug, Clone)]
pub struct ReportWriter {
    reports_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            reports_dir: repo_root.join(CACHE_ROOT).join("reports"),
        }
    }

    /// Root of the reports directory
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    fn write(&self, relative: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.reports_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        debug!(path = %path.display(), "wrote report file");
        Ok(path)
    }

    /// `reports/summary.json`
    pub fn write_summary_report(&self, summary: &ReportSummary) -> monokit_core::Result<PathBuf> {
        let json = serde_json::to_string_pretty(summary)?;
        Ok(self.write("summary.json", &format!("{}\n", json))?)
    }

    /// `reports/scopes/<scope>.json`
    pub fn write_scope_report(&self, scope: &ScopeReport) -> monokit_core::Result<PathBuf> {
        let json = serde_json::to_string_pretty(scope)?;
        let relative = format!("scopes/{}.json", sanitize_segment(&scope.id));
        Ok(self.write(&relative, &format!("{}\n", json))?)
    }

    /// `reports/logs/<scope>/<task>.stdout.log` and `.stderr.log`
    pub fn write_task_logs(&self, task: &TaskRunResult) -> monokit_core::Result<()> {
        let base = format!(
            "logs/{}/{}",
            sanitize_segment(&task.scope_id),
            sanitize_segment(&task.task_id)
        );
        self.write(&format!("{}.stdout.log", base), &task.stdout)?;
        self.write(&format!("{}.stderr.log", base), &task.stderr)?;
        Ok(())
    }

    /// Write the summary, one report per scope, and every task's logs
    #[instrument(skip_all, fields(pipeline = pipeline, scopes = results.len()))]
    pub fn write_all(&self, pipeline: &str, results: &[ScopeRunResult]) -> monokit_core::Result<ReportSummary> {
        let summary = ReportSummary::from_results(pipeline, results);
        for (scope, report) in results.iter().zip(&summary.scopes) {
            self.write_scope_report(report)?;
            for task in &scope.tasks {
                self.write_task_logs(task)?;
            }
        }
        self.write_summary_report(&summary)?;
        Ok(summary)
    }
}
