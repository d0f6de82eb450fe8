//! Documentation site tasks

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, instrument};

use monokit_core::error::ConfigError;
use monokit_core::fs::assert_path_within_root;

use super::{TaskContext, TaskHandler};
use crate::runner::ExecOutput;

/// Runs `docs:lint`, `docs:build` and `docs:serve` through pnpm
#[derive(Debug, Clone, Copy, Default)]
pub struct DocsHandler;

#[async_trait]
impl TaskHandler for DocsHandler {
    #[instrument(skip_all, fields(task = ctx.task_id))]
    async fn run(&self, ctx: &TaskContext<'_>) -> monokit_core::Result<ExecOutput> {
        let docs_root = ctx.repo_root.join(&ctx.config.docs.root);
        let repo_root = ctx.repo_root.to_string_lossy().into_owned();

        let args: Vec<String> = match ctx.task_id {
            "docs:lint" => vec!["pnpm".into(), "-C".into(), repo_root, "docs:lint".into()],
            "docs:build" | "docs:serve" => {
                assert_path_within_root(ctx.repo_root, &docs_root, "docs root")?;
                let command = ctx.task_id.trim_start_matches("docs:");
                vec![
                    "pnpm".into(),
                    "-C".into(),
                    docs_root.to_string_lossy().into_owned(),
                    command.into(),
                ]
            }
            other => return Err(ConfigError::UnsupportedTask(other.to_string()).into()),
        };

        debug!(args = ?args, "running docs task");
        Ok(ctx.runner.run(&args, &HashMap::new()).await?)
    }
}
