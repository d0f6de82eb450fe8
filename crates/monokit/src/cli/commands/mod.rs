//! CLI commands

mod cache;
mod changed;
mod completions;
mod doctor;
mod infra;
mod init;
mod list;
mod run;

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use monokit_core::config::load_config_from_dir;
use monokit_core::{discover_scopes, Config, ScopeRecord, Selection};

pub use cache::CacheCommand;
pub use changed::ChangedCommand;
pub use completions::CompletionsCommand;
pub use doctor::DoctorCommand;
pub use infra::InfraCommand;
pub use init::InitCommand;
pub use list::ListCommand;
pub use run::RunCommand;

/// Environment variables CI systems use to report the target branch
const CI_BASE_REF_VARS: [&str; 4] = [
    "GITHUB_BASE_REF",
    "CI_MERGE_REQUEST_TARGET_BRANCH_NAME",
    "CI_DEFAULT_BRANCH",
    "CHANGE_TARGET",
];

/// First non-empty CI base branch from `lookup`
fn ci_base_ref_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    CI_BASE_REF_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Base branch reported by the CI environment, if any
pub fn ci_base_ref() -> Option<String> {
    ci_base_ref_from(|name| std::env::var(name).ok())
}

/// Loaded configuration and the repository it governs
pub struct Workspace {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
}

impl Workspace {
    /// Find and load the configuration governing the current directory
    pub fn load() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let loaded = load_config_from_dir(&cwd)?;
        debug!(root = %loaded.root.display(), config = %loaded.path.display(), "loaded workspace");
        Ok(Self {
            root: loaded.root,
            config_path: loaded.path,
            config: loaded.config,
        })
    }

    /// Every scope in the repository
    pub fn scopes(&self) -> anyhow::Result<Vec<ScopeRecord>> {
        Ok(discover_scopes(&self.root, &self.config.paths, &self.config.scopes)?)
    }
}

/// Scope selection flags shared by `run` and `changed`
#[derive(Debug, Clone, Default, Args)]
pub struct SelectionArgs {
    /// Run only this scope (id or path)
    #[arg(long)]
    pub scope: Option<String>,

    /// Run only scopes carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Run every scope
    #[arg(long)]
    pub all: bool,

    /// Select scopes affected by changes (default)
    #[arg(long, conflicts_with = "no_changed")]
    pub changed: bool,

    /// Disable change detection and select every scope
    #[arg(long)]
    pub no_changed: bool,

    /// Compare against this commit instead of the base branch
    #[arg(long)]
    pub since: Option<String>,

    /// Base branch for change detection
    #[arg(long)]
    pub base: Option<String>,
}

impl SelectionArgs {
    /// Build the selection; an explicit scope, tag or `--all` turns off change detection
    pub fn to_selection(&self, ci_base_ref: Option<String>) -> Selection {
        let explicit = self.scope.is_some() || self.tag.is_some() || self.all;
        Selection {
            scope: self.scope.clone(),
            tag: self.tag.clone(),
            all: self.all,
            changed: !explicit && !self.no_changed,
            since: self.since.clone(),
            base: self.base.clone(),
            ci_base_ref,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ci_base_ref_precedence() {
        let vars = |name: &str| match name {
            "CI_MERGE_REQUEST_TARGET_BRANCH_NAME" => Some("develop".to_string()),
            "CHANGE_TARGET" => Some("release".to_string()),
            _ => None,
        };
        assert_eq!(ci_base_ref_from(vars), Some("develop".to_string()));

        let blank = |name: &str| (name == "GITHUB_BASE_REF").then(|| "  ".to_string());
        assert_eq!(ci_base_ref_from(blank), None);
    }

    #[test]
    fn test_explicit_filters_disable_change_detection() {
        let args = SelectionArgs {
            tag: Some("api".to_string()),
            ..Default::default()
        };
        let selection = args.to_selection(None);
        assert!(!selection.changed);
        assert_eq!(selection.tag.as_deref(), Some("api"));

        let selection = SelectionArgs::default().to_selection(Some("main".to_string()));
        assert!(selection.changed);
        assert_eq!(selection.ci_base_ref.as_deref(), Some("main"));

        let args = SelectionArgs {
            no_changed: true,
            ..Default::default()
        };
        assert!(!args.to_selection(None).changed);
    }
}
