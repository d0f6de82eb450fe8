//! Doctor command - check the tools and layout monokit relies on

use std::path::Path;
use std::process::Command;

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::info;

use monokit_core::config::{validate_config, DockerConfig};
use monokit_tasks::cache::ensure_cache_layout;

use super::Workspace;
use crate::cli::{Cli, OutputFormat};

/// Check the environment for required tools and configuration
#[derive(Debug, Args)]
pub struct DoctorCommand {
    /// Show suggestions for fixing issues
    #[arg(long)]
    pub fix: bool,
}

/// Result of a single check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: Option<String>,
    pub fix_suggestion: Option<String>,
}

/// Status of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

/// Summary of all checks
#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub status: &'static str,
    pub checks: Vec<CheckResult>,
    pub fail_count: usize,
    pub warn_count: usize,
}

impl DoctorSummary {
    fn new(checks: Vec<CheckResult>) -> Self {
        let count = |status| checks.iter().filter(|c| c.status == status).count();
        let fail_count = count(CheckStatus::Fail);
        let warn_count = count(CheckStatus::Warn);
        Self {
            status: if fail_count == 0 { "ok" } else { "error" },
            checks,
            fail_count,
            warn_count,
        }
    }
}

impl CheckResult {
    fn ok(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: Some(message.into()),
            fix_suggestion: None,
        }
    }

    fn failed(name: &str, status: CheckStatus, message: impl Into<String>, fix: &str) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: Some(message.into()),
            fix_suggestion: Some(fix.to_string()),
        }
    }
}

/// Run `program args` and report its first output line
fn check_command(name: &str, program: &str, args: &[&str], fix: &str) -> CheckResult {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout);
            CheckResult::ok(name, text.lines().next().unwrap_or_default().trim())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            CheckResult::failed(name, CheckStatus::Fail, stderr.trim(), fix)
        }
        Err(_) => CheckResult::failed(name, CheckStatus::Fail, "Not found", fix),
    }
}

fn check_cache_layout(root: &Path) -> CheckResult {
    match ensure_cache_layout(root) {
        Ok(dir) => CheckResult::ok("cache", dir.display().to_string()),
        Err(e) => CheckResult::failed(
            "cache",
            CheckStatus::Fail,
            e.to_string(),
            "Make the .cache directory writable",
        ),
    }
}

fn check_compose_file(root: &Path, docker: &DockerConfig) -> Vec<CheckResult> {
    [
        ("tools compose file", &docker.compose_file, CheckStatus::Fail),
        ("infra compose file", &docker.infra_compose, CheckStatus::Warn),
    ]
    .into_iter()
    .map(|(name, rel, missing)| {
        if root.join(rel).is_file() {
            CheckResult::ok(name, rel.as_str())
        } else {
            CheckResult::failed(name, missing, format!("{} not found", rel), "Create it or update the docker section")
        }
    })
    .collect()
}

/// Checks that need a loaded workspace, or a single failure when none loads
fn workspace_checks() -> (Vec<CheckResult>, DockerConfig) {
    let workspace = match Workspace::load() {
        Ok(w) => w,
        Err(e) => {
            let check = CheckResult::failed(
                "config",
                CheckStatus::Fail,
                format!("{:#}", e),
                "Run 'monokit init' at the repository root",
            );
            return (vec![check], DockerConfig::default());
        }
    };

    let mut checks = Vec::new();
    checks.push(match validate_config(&workspace.config) {
        Ok(()) => CheckResult::ok("config", workspace.config_path.display().to_string()),
        Err(e) => CheckResult::failed("config", CheckStatus::Fail, e.to_string(), "Fix the reported field"),
    });
    checks.extend(check_compose_file(&workspace.root, &workspace.config.docker));
    checks.push(check_cache_layout(&workspace.root));
    (checks, workspace.config.docker)
}

impl DoctorCommand {
    /// Execute the doctor command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(fix = self.fix, "executing doctor command");

        let (mut checks, docker) = workspace_checks();
        checks.push(check_command("git", "git", &["--version"], "Install git"));
        checks.push(check_command(
            "container cli",
            &docker.command,
            &["--version"],
            "Install Docker or set docker.command",
        ));
        checks.push(check_command(
            "compose",
            &docker.command,
            &["compose", "version"],
            "Install the compose plugin",
        ));

        let summary = DoctorSummary::new(checks);
        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            OutputFormat::Text if !cli.quiet => self.print(&summary),
            OutputFormat::Text => {}
        }

        if summary.fail_count > 0 {
            anyhow::bail!("{} check(s) failed", summary.fail_count);
        }
        Ok(())
    }

    fn print(&self, summary: &DoctorSummary) {
        println!("{}", style("Checking environment...").bold());
        println!();
        for check in &summary.checks {
            println!(
                "  {} {} {}",
                status_icon(check.status),
                style(&check.name).bold(),
                style(check.message.as_deref().unwrap_or_default()).dim()
            );
        }

        if self.fix && (summary.fail_count > 0 || summary.warn_count > 0) {
            println!();
            println!("{}", style("Suggested fixes:").bold());
            for check in summary.checks.iter().filter(|c| matches!(c.status, CheckStatus::Fail | CheckStatus::Warn)) {
                if let Some(fix) = &check.fix_suggestion {
                    println!("  {} {}: {}", status_icon(check.status), style(&check.name).bold(), fix);
                }
            }
        }
    }
}

fn status_icon(status: CheckStatus) -> console::StyledObject<&'static str> {
    match status {
        CheckStatus::Ok => style("✓").green(),
        CheckStatus::Warn => style("!").yellow(),
        CheckStatus::Fail => style("✗").red(),
    }
}
