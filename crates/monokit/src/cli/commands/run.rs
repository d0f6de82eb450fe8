//! Run command: execute a pipeline across the selected scopes

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use tracing::{info, warn};

use monokit_core::select_scopes;
use monokit_git::GitChangedFiles;
use monokit_tasks::{
    execute_pipeline, ComposeRunner, FanoutReporter, HandlerTable, PipelineError, PipelineEvent,
    PipelineReporter, PipelineRequest, Redactor, ReportWriter, ScopeRunResult, TracingReporter,
};

use super::{ci_base_ref, SelectionArgs, Workspace};
use crate::cli::{output, Cli, OutputFormat};

/// Run a pipeline across the selected scopes
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Pipeline name from `tasks.pipelines`
    pub pipeline: String,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Maximum scopes processed concurrently (overrides `tasks.jobs`)
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Print the commands without running them
    #[arg(long)]
    pub dry_run: bool,
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let workspace = Workspace::load()?;
        let mut config = workspace.config.clone();
        if let Some(jobs) = self.jobs {
            config.tasks.jobs = jobs.max(1);
        }

        let ci_base_ref = ci_base_ref();
        let scopes = workspace.scopes()?;
        let provider = GitChangedFiles::new(&workspace.root);
        let selection = self.selection.to_selection(ci_base_ref.clone());
        let selected = select_scopes(&scopes, &selection, &config, &provider)?;

        if selected.is_empty() {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "pipeline": self.pipeline, "scopes": [] }));
            } else if !cli.quiet {
                output::success("No scopes selected, nothing to run.");
            }
            return Ok(());
        }
        info!(pipeline = %self.pipeline, scopes = selected.len(), "running pipeline");

        let runner = ComposeRunner::new(&workspace.root, config.docker.clone())
            .with_timeout(config.tasks.task_timeout_secs.map(Duration::from_secs))
            .with_redactor(Redactor::from_vars(std::env::vars()));
        if !self.dry_run {
            runner.preflight()?;
        }

        let reporter: Arc<dyn PipelineReporter> = if cli.quiet || cli.format == OutputFormat::Json {
            Arc::new(TracingReporter)
        } else {
            Arc::new(
                FanoutReporter::new()
                    .with(TracingReporter)
                    .with(ConsoleReporter::new(cli.verbose, self.dry_run)),
            )
        };

        let request = PipelineRequest::new(&workspace.root, &self.pipeline, selected, Arc::new(config))
            .with_dry_run(self.dry_run);
        let outcome = execute_pipeline(
            request,
            Arc::new(runner),
            Arc::new(HandlerTable::standard(ci_base_ref)),
            reporter,
        )
        .await;

        let results: Option<&[ScopeRunResult]> = match &outcome {
            Ok(results) => Some(results),
            Err(err) => err.results(),
        };
        if let (Some(results), false) = (results, self.dry_run) {
            let writer = ReportWriter::new(&workspace.root);
            match writer.write_all(&self.pipeline, results) {
                Ok(_) => {
                    info!(dir = %writer.reports_dir().display(), "reports written");
                    if cli.verbose && cli.format == OutputFormat::Text {
                        output::info(&format!("Reports written to {}", writer.reports_dir().display()));
                    }
                }
                Err(e) => warn!(error = %e, "failed to write reports"),
            }
        }

        if cli.format == OutputFormat::Json {
            if let Some(results) = results {
                print_json(&self.pipeline, results)?;
            }
        } else if self.dry_run && !cli.quiet {
            println!();
            println!("{}", style("[DRY RUN - no tasks were executed]").yellow().bold());
        }

        match outcome {
            Ok(_) => Ok(()),
            Err(err @ PipelineError::TaskFailed { .. }) => {
                if !cli.quiet && cli.format == OutputFormat::Text {
                    print_failures(err.results().unwrap_or_default());
                }
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn print_json(pipeline: &str, results: &[ScopeRunResult]) -> anyhow::Result<()> {
    let summary = monokit_tasks::ReportSummary::from_results(pipeline, results);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_failures(results: &[ScopeRunResult]) {
    let failed: Vec<_> = results.iter().filter_map(ScopeRunResult::failure).collect();
    println!();
    println!(
        "  {} {}/{} scopes failed:",
        style("✗").red().bold(),
        failed.len(),
        results.len()
    );
    for task in failed {
        println!(
            "    {} {} {} (exit code {})",
            style("✗").red(),
            style(&task.scope_id).bold(),
            task.task_id,
            task.exit_code
        );
        let excerpt: String = task.stderr.lines().take(5).collect::<Vec<_>>().join("\n      ");
        if !excerpt.is_empty() {
            println!("      {}", style(excerpt).dim());
        }
    }
}

/// Console reporter with live progress
struct ConsoleReporter {
    verbose: bool,
    dry_run: bool,
}

impl ConsoleReporter {
    fn new(verbose: bool, dry_run: bool) -> Self {
        Self { verbose, dry_run }
    }
}

impl PipelineReporter for ConsoleReporter {
    fn report(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::PipelineStarted {
                pipeline,
                scopes,
                tasks,
                jobs,
            } => {
                println!();
                println!(
                    "{} {} across {} scope{} ({} job{})",
                    style("→").blue(),
                    style(pipeline).bold(),
                    scopes,
                    if *scopes == 1 { "" } else { "s" },
                    jobs,
                    if *jobs == 1 { "" } else { "s" },
                );
                if self.verbose || self.dry_run {
                    println!("  {} {}", style("tasks:").dim(), tasks.join(" → "));
                }
                println!();
            }
            PipelineEvent::ScopeStarted { scope } => {
                if self.verbose {
                    println!("  {} {}", style("─").dim(), style(scope).bold());
                }
            }
            PipelineEvent::TaskStarted { scope, task, command } => {
                println!(
                    "  {} {} {} {}",
                    style("▸").dim(),
                    style(scope).bold(),
                    task,
                    if self.verbose {
                        style(format!("({})", command)).dim().to_string()
                    } else {
                        String::new()
                    }
                );
            }
            PipelineEvent::TaskCompleted {
                scope,
                task,
                duration,
                cached,
            } => {
                if *cached {
                    println!(
                        "  {} {} {} {}",
                        style("✓").green(),
                        style(scope).green(),
                        task,
                        style("(cached)").cyan()
                    );
                } else if self.dry_run {
                    println!("  {} {} {}", style("○").yellow(), style(scope).yellow(), task);
                } else {
                    println!(
                        "  {} {} {} {}",
                        style("✓").green(),
                        style(scope).green(),
                        task,
                        style(format!("{:.1}s", duration.as_secs_f64())).dim()
                    );
                }
            }
            PipelineEvent::TaskFailed {
                scope,
                task,
                exit_code,
                duration,
            } => {
                println!(
                    "  {} {} {} {} {}",
                    style("✗").red(),
                    style(scope).red(),
                    task,
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(format!("exit code {}", exit_code)).red().dim()
                );
            }
            PipelineEvent::ScopeCompleted { .. } => {}
            PipelineEvent::AllCompleted {
                scopes,
                failed,
                cached,
                duration,
            } => {
                println!();
                println!(
                    "  {} {}/{} scopes succeeded, {} failed, {} cached ({:.1}s)",
                    if *failed == 0 {
                        style("✓").green().bold()
                    } else {
                        style("✗").red().bold()
                    },
                    scopes - failed,
                    scopes,
                    failed,
                    cached,
                    duration.as_secs_f64()
                );
            }
        }
    }
}
