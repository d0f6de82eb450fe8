//! Infra command: drive the infrastructure compose project

use clap::{Args, Subcommand};
use tracing::info;

use monokit_tasks::{ComposeRunner, InfraAction, Redactor};

use super::Workspace;
use crate::cli::{Cli, OutputFormat};
use crate::exit_codes::ToolExit;

/// Manage long-running infrastructure services
#[derive(Debug, Args)]
pub struct InfraCommand {
    #[command(subcommand)]
    pub action: InfraSubcommand,
}

/// Infra subcommands
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum InfraSubcommand {
    /// Start infra services in the background
    Up,
    /// Stop infra services
    Down,
    /// List infra services
    Ps,
    /// Print infra logs
    Logs,
}

impl From<InfraSubcommand> for InfraAction {
    fn from(value: InfraSubcommand) -> Self {
        match value {
            InfraSubcommand::Up => Self::Up,
            InfraSubcommand::Down => Self::Down,
            InfraSubcommand::Ps => Self::Ps,
            InfraSubcommand::Logs => Self::Logs,
        }
    }
}

impl InfraCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let workspace = Workspace::load()?;
        let action = InfraAction::from(self.action);
        info!(action = ?action, "running infra compose");

        let runner = ComposeRunner::new(&workspace.root, workspace.config.docker.clone())
            .with_redactor(Redactor::from_vars(std::env::vars()));
        let output = runner.infra(action).await?;

        if cli.format == OutputFormat::Json {
            println!(
                "{}",
                serde_json::json!({
                    "exitCode": output.exit_code,
                    "stdout": output.stdout,
                    "stderr": output.stderr,
                })
            );
        } else {
            if !output.stdout.is_empty() && !cli.quiet {
                println!("{}", output.stdout.trim_end());
            }
            if !output.stderr.is_empty() {
                eprint!("{}", output.stderr);
            }
        }

        if !output.is_success() {
            return Err(ToolExit {
                command: format!(
                    "{} compose {}",
                    workspace.config.docker.command,
                    action.compose_args().join(" ")
                ),
                code: output.exit_code,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommands_map_to_actions() {
        assert_eq!(InfraAction::from(InfraSubcommand::Up), InfraAction::Up);
        assert_eq!(InfraAction::from(InfraSubcommand::Logs).compose_args(), &["logs"]);
    }
}
