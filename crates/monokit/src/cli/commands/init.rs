//! Init command

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use dialoguer::{Confirm, Select};
use tracing::info;

use monokit_core::config::{validate_config, Config, DEFAULT_CONFIG_TEMPLATE, DEFAULT_CONFIG_YAML};

use crate::cli::Cli;

/// Write a starter monokit.yaml
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Use defaults without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl InitCommand {
    /// Execute the init command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(force = self.force, yes = self.yes, "executing init command");
        let cwd = std::env::current_dir()?;
        let config_path = self
            .output
            .clone()
            .unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_YAML));

        // Check if config already exists
        if config_path.exists() && !self.force {
            if self.yes {
                anyhow::bail!(
                    "Configuration file already exists at {}. Use --force to overwrite.",
                    config_path.display()
                );
            }

            let overwrite = Confirm::new()
                .with_prompt(format!(
                    "Configuration file already exists at {}. Overwrite?",
                    config_path.display()
                ))
                .default(false)
                .interact()?;

            if !overwrite {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        // Choose format if not specified
        let format = if self.yes {
            "yaml"
        } else {
            let formats = vec!["yaml", "toml"];
            let selection = Select::new()
                .with_prompt("Configuration format")
                .items(&formats)
                .default(0)
                .interact()?;
            formats[selection]
        };

        let (config_path, content) = render_config(&config_path, format)?;
        std::fs::write(&config_path, &content)?;

        if !cli.quiet {
            println!(
                "{} Created configuration at {}",
                style("✓").green().bold(),
                style(config_path.display()).cyan()
            );
            println!();
            println!("Next steps:");
            println!("  1. Edit {} to describe your pipelines", config_path.display());
            println!("  2. Run {} to check scope discovery", style("monokit list").cyan());
            println!("  3. Run {} to execute a pipeline", style("monokit run check").cyan());
        }

        Ok(())
    }
}

/// Starter configuration in `format`, with the path's extension adjusted to match
fn render_config(path: &Path, format: &str) -> anyhow::Result<(PathBuf, String)> {
    if format != "toml" {
        return Ok((path.to_path_buf(), DEFAULT_CONFIG_TEMPLATE.to_string()));
    }

    let config: Config = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE)?;
    validate_config(&config)?;
    let path = if path.extension().is_some_and(|e| e == "yaml") {
        path.with_extension("toml")
    } else {
        path.to_path_buf()
    };
    Ok((path, toml::to_string_pretty(&config)?))
}
