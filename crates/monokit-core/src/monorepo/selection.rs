//! Scope selection
//!
//! Resolves what the user asked for (an explicit scope, a tag, everything,
//! or whatever a git change touched) into the concrete scope list a pipeline
//! runs against.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::types::{ScopeRecord, ScopeType};

use super::changes::{map_changed_files_to_scopes, ChangeToken};

/// What the caller asked to run against
#[derive(Debug, Clone)]
pub struct Selection {
    /// Exact scope id or path
    pub scope: Option<String>,
    /// Tag filter
    pub tag: Option<String>,
    /// Every scope
    pub all: bool,
    /// Only scopes affected by a change
    pub changed: bool,
    /// Explicit base commit
    pub since: Option<String>,
    /// Base branch (defaults to `git.default_branch`)
    pub base: Option<String>,
    /// Base branch reported by the CI environment, if any
    pub ci_base_ref: Option<String>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            scope: None,
            tag: None,
            all: false,
            changed: true,
            since: None,
            base: None,
            ci_base_ref: None,
        }
    }
}

/// Arguments for a changed-files lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFilesRequest {
    /// Explicit base commit, used verbatim
    pub since: Option<String>,
    /// Base branch requested by the caller
    pub base: Option<String>,
    /// Base branch reported by the CI environment
    pub ci_base_ref: Option<String>,
    /// Fallback base branch
    pub default_branch: String,
    /// Whether the base branch may be fetched when merge-base fails
    pub allow_fetch_base: bool,
    /// Remote fetched from
    pub remote: String,
}

/// Source of the files changed between a base and HEAD.
///
/// Paths are repository-relative with forward slashes.
pub trait ChangedFilesProvider {
    /// List changed files
    fn changed_files(&self, request: &ChangedFilesRequest) -> Result<Vec<String>>;
}

fn select_by_scope(scopes: &[ScopeRecord], id_or_path: &str) -> Vec<ScopeRecord> {
    scopes
        .iter()
        .filter(|s| s.id == id_or_path || s.path == id_or_path)
        .cloned()
        .collect()
}

fn select_by_tag(scopes: &[ScopeRecord], tag: &str) -> Vec<ScopeRecord> {
    scopes.iter().filter(|s| s.has_tag(tag)).cloned().collect()
}

/// Resolve a selection into the scopes to run.
///
/// Precedence: explicit scope, then tag, then `all`, then `changed == false`
/// (everything), then change detection through `provider`.
#[instrument(skip_all, fields(scopes = scopes.len()))]
pub fn select_scopes(
    scopes: &[ScopeRecord],
    selection: &Selection,
    config: &Config,
    provider: &dyn ChangedFilesProvider,
) -> Result<Vec<ScopeRecord>> {
    if let Some(scope) = &selection.scope {
        debug!(scope = %scope, "selecting by scope");
        return Ok(select_by_scope(scopes, scope));
    }
    if let Some(tag) = &selection.tag {
        debug!(tag = %tag, "selecting by tag");
        return Ok(select_by_tag(scopes, tag));
    }
    if selection.all || !selection.changed {
        debug!("selecting all scopes");
        return Ok(scopes.to_vec());
    }

    let request = ChangedFilesRequest {
        since: selection.since.clone(),
        base: selection.base.clone(),
        ci_base_ref: selection.ci_base_ref.clone(),
        default_branch: config.git.default_branch.clone(),
        allow_fetch_base: config.git.allow_fetch_base,
        remote: config.git.remote.clone(),
    };
    let changed_files = provider.changed_files(&request)?;
    let affected = map_changed_files_to_scopes(&changed_files, scopes, &config.changed);

    if affected.iter().any(|e| e == ChangeToken::ALL) {
        info!("tooling changed, selecting all scopes");
        return Ok(scopes.to_vec());
    }

    let mut ids: HashSet<&str> = affected
        .iter()
        .filter(|e| !ChangeToken::is_token(e))
        .map(String::as_str)
        .collect();

    for (token, scope_type) in [
        (ChangeToken::CONTRACTS, ScopeType::Service),
        (ChangeToken::DOCS, ScopeType::Docs),
    ] {
        if !affected.iter().any(|e| e == token) {
            continue;
        }
        for scope in scopes.iter().filter(|s| s.scope_type == scope_type) {
            ids.insert(scope.id.as_str());
        }
    }

    let selected: Vec<ScopeRecord> = scopes
        .iter()
        .filter(|s| ids.contains(s.id.as_str()))
        .cloned()
        .collect();

    info!(
        changed_files = changed_files.len(),
        selected = selected.len(),
        "selected changed scopes"
    );
    Ok(selected)
}
