//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    CacheCommand, ChangedCommand, CompletionsCommand, DoctorCommand, InfraCommand, InitCommand, ListCommand,
    RunCommand,
};

/// monokit - monorepo task orchestration
#[derive(Debug, Parser)]
#[command(name = "monokit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a starter monokit.yaml
    Init(InitCommand),

    /// Run a pipeline across the selected scopes
    Run(RunCommand),

    /// List discovered scopes
    List(ListCommand),

    /// Show the scopes a change set selects
    Changed(ChangedCommand),

    /// Inspect or clear the task cache
    Cache(CacheCommand),

    /// Start, stop or inspect infrastructure services
    Infra(InfraCommand),

    /// Check required tools and the cache layout
    Doctor(DoctorCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Init(ref cmd) => cmd.execute(&self),
            Commands::Run(ref cmd) => cmd.execute(&self),
            Commands::List(ref cmd) => cmd.execute(&self),
            Commands::Changed(ref cmd) => cmd.execute(&self),
            Commands::Cache(ref cmd) => cmd.execute(&self),
            Commands::Infra(ref cmd) => cmd.execute(&self),
            Commands::Doctor(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_global_flags() {
        let cli = Cli::try_parse_from([
            "monokit", "-v", "--format", "json", "-C", "/repo", "run", "ci", "--tag", "api", "--jobs", "3",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.directory, Some(PathBuf::from("/repo")));
        let Commands::Run(run) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(run.pipeline, "ci");
        assert_eq!(run.selection.tag.as_deref(), Some("api"));
        assert_eq!(run.jobs, Some(3));
    }

    #[test]
    fn test_changed_flags_conflict() {
        let result = Cli::try_parse_from(["monokit", "run", "ci", "--changed", "--no-changed"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_infra_and_doctor_parse() {
        let cli = Cli::try_parse_from(["monokit", "infra", "up"]).unwrap();
        assert!(matches!(cli.command, Commands::Infra(_)));

        let cli = Cli::try_parse_from(["monokit", "doctor", "--fix"]).unwrap();
        let Commands::Doctor(doctor) = cli.command else {
            panic!("expected doctor command");
        };
        assert!(doctor.fix);

        let cli = Cli::try_parse_from(["monokit", "list", "--ports"]).unwrap();
        let Commands::List(list) = cli.command else {
            panic!("expected list command");
        };
        assert!(list.ports);
    }

    #[test]
    fn test_cache_subcommands() {
        let cli = Cli::try_parse_from(["monokit", "cache", "clean", "-y"]).unwrap();
        assert!(matches!(cli.command, Commands::Cache(_)));
    }
}
