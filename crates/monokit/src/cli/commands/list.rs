//! List command

use clap::Args;
use console::style;
use tracing::info;

use monokit_core::{ScopeRecord, ScopeType};

use super::Workspace;
use crate::cli::{output, Cli, OutputFormat};

/// List discovered scopes
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show scopes of this type
    #[arg(long = "type")]
    pub scope_type: Option<ScopeType>,

    /// Only show scopes carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only show scopes with a port, as `id port`
    #[arg(long)]
    pub ports: bool,
}

impl ListCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let workspace = Workspace::load()?;
        let scopes: Vec<ScopeRecord> = workspace
            .scopes()?
            .into_iter()
            .filter(|s| self.scope_type.map_or(true, |t| s.scope_type == t))
            .filter(|s| self.tag.as_deref().map_or(true, |t| s.has_tag(t)))
            .filter(|s| !self.ports || s.port.is_some())
            .collect();
        info!(scopes = scopes.len(), ports = self.ports, "listing scopes");

        if self.ports {
            return print_ports(&scopes, cli.format);
        }

        if cli.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&scopes)?);
            return Ok(());
        }
        if cli.quiet {
            for scope in &scopes {
                println!("{}", scope.id);
            }
            return Ok(());
        }

        println!("{}", output::header("Scopes"));
        println!(
            "{}",
            output::key_value("config", &output::path_style().apply_to(workspace.config_path.display()).to_string())
        );
        println!();
        for scope in &scopes {
            print_scope(scope, cli.verbose);
        }
        println!();
        println!("  {} scope{}", scopes.len(), if scopes.len() == 1 { "" } else { "s" });
        Ok(())
    }
}

fn port_rows(scopes: &[ScopeRecord]) -> Vec<(&str, u16)> {
    scopes
        .iter()
        .filter_map(|s| s.port.map(|port| (s.id.as_str(), port)))
        .collect()
}

fn print_ports(scopes: &[ScopeRecord], format: OutputFormat) -> anyhow::Result<()> {
    let rows = port_rows(scopes);
    if format == OutputFormat::Json {
        let ports: Vec<_> = rows
            .iter()
            .map(|(id, port)| serde_json::json!({ "id": id, "port": port }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "ports": ports }))?);
    } else {
        for (id, port) in rows {
            println!("{} {}", id, port);
        }
    }
    Ok(())
}

pub(super) fn print_scope(scope: &ScopeRecord, verbose: bool) {
    let mut line = format!(
        "  {} {} {}",
        output::scope_style().apply_to(&scope.id),
        style(format!("[{}]", scope.scope_type)).dim(),
        output::path_style().apply_to(&scope.path)
    );
    if let Some(port) = scope.port {
        line.push_str(&format!(" :{}", port));
    }
    if !scope.tags.is_empty() {
        line.push_str(&format!(" {}", output::tag_style().apply_to(scope.tags.join(","))));
    }
    println!("{}", line);

    if verbose {
        println!("    {}", output::key_value("profile", &scope.profile));
        if let Some(deps) = &scope.deps {
            println!("    {}", output::key_value("deps", &deps.join(", ")));
        }
    }
}
