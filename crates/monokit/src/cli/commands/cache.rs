//! Cache management command

use clap::{Args, Subcommand};
use console::style;

use monokit_tasks::cache::{cache_file_path, cache_status, clean_cache};

use super::Workspace;
use crate::cli::{Cli, OutputFormat};

/// Task cache management
#[derive(Debug, Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show cache statistics
    Status(CacheStatusCommand),
    /// Remove the task cache file
    Clean(CacheCleanCommand),
}

/// Show cache statistics
#[derive(Debug, Args)]
pub struct CacheStatusCommand;

/// Remove the task cache file
#[derive(Debug, Args)]
pub struct CacheCleanCommand {
    /// Skip confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl CacheCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.action {
            CacheAction::Status(cmd) => cmd.execute(cli),
            CacheAction::Clean(cmd) => cmd.execute(cli),
        }
    }
}

impl CacheStatusCommand {
    fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let workspace = Workspace::load()?;
        let path = cache_file_path(&workspace.root);
        let stats = cache_status(&workspace.root);

        if cli.format == OutputFormat::Json {
            let result = serde_json::json!({
                "exists": stats.exists,
                "scopes": stats.scopes,
                "entries": stats.entries,
                "total_size": stats.total_size,
                "total_size_formatted": stats.formatted_size(),
                "cache_file": path.display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if !cli.quiet {
            println!("{}", style("Task Cache Status").bold());
            println!();
            println!("  Location: {}", style(path.display()).cyan());
            if !stats.exists {
                println!("  {}", style("No cache file yet").dim());
                return Ok(());
            }
            println!("  Scopes:   {}", stats.scopes);
            println!("  Entries:  {}", stats.entries);
            println!("  Size:     {}", style(stats.formatted_size()).yellow());
        }

        Ok(())
    }
}

impl CacheCleanCommand {
    fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let workspace = Workspace::load()?;
        let path = cache_file_path(&workspace.root);

        if !path.exists() {
            if !cli.quiet {
                println!("{} Cache file does not exist.", style("✓").green());
            }
            return Ok(());
        }

        if !self.yes {
            let confirmed = dialoguer::Confirm::new()
                .with_prompt(format!("Remove the task cache at {}?", path.display()))
                .default(false)
                .interact()?;

            if !confirmed {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        let removed = clean_cache(&workspace.root)?;

        if cli.format == OutputFormat::Json {
            println!("{}", serde_json::json!({ "removed": removed }));
        } else if !cli.quiet {
            println!(
                "{} Cache cleared at {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }

        Ok(())
    }
}
