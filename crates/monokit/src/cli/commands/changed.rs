//! Changed command

use clap::Args;
use tracing::info;

use monokit_core::{map_changed_files_to_scopes, select_scopes, ChangedFilesRequest};
use monokit_git::GitChangedFiles;

use super::{ci_base_ref, list::print_scope, SelectionArgs, Workspace};
use crate::cli::{output, Cli, OutputFormat};

/// Show the scopes a change set selects
#[derive(Debug, Args)]
pub struct ChangedCommand {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Also print the changed files and the tokens they map to
    #[arg(long)]
    pub files: bool,
}

impl ChangedCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let workspace = Workspace::load()?;
        let config = &workspace.config;
        let scopes = workspace.scopes()?;
        let provider = GitChangedFiles::new(&workspace.root);
        let selection = self.selection.to_selection(ci_base_ref());
        let selected = select_scopes(&scopes, &selection, config, &provider)?;
        info!(selected = selected.len(), "selected scopes");

        let files = if self.files {
            let request = ChangedFilesRequest {
                since: selection.since.clone(),
                base: selection.base.clone(),
                ci_base_ref: selection.ci_base_ref.clone(),
                default_branch: config.git.default_branch.clone(),
                allow_fetch_base: config.git.allow_fetch_base,
                remote: config.git.remote.clone(),
            };
            Some(provider.list(&request)?)
        } else {
            None
        };

        if cli.format == OutputFormat::Json {
            let mut payload = serde_json::json!({
                "scopes": selected.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            });
            if let Some(files) = &files {
                payload["files"] = serde_json::json!(files);
                payload["mapped"] = serde_json::json!(map_changed_files_to_scopes(files, &scopes, &config.changed));
            }
            println!("{}", serde_json::to_string_pretty(&payload)?);
            return Ok(());
        }

        if let Some(files) = &files {
            if !cli.quiet {
                println!("{}", output::header("Changed files"));
                for file in files {
                    println!("  {}", output::path_style().apply_to(file));
                }
                let mapped = map_changed_files_to_scopes(files, &scopes, &config.changed);
                println!("{}", output::key_value("mapped", &mapped.join(", ")));
                println!();
            }
        }

        if selected.is_empty() {
            if !cli.quiet {
                output::warning("No scopes affected.");
            }
            return Ok(());
        }

        if cli.quiet {
            for scope in &selected {
                println!("{}", scope.id);
            }
        } else {
            println!("{}", output::header("Selected scopes"));
            for scope in &selected {
                print_scope(scope, cli.verbose);
            }
        }
        Ok(())
    }
}
