//! Scope discovery in the repository layout

use std::path::Path;

use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::config::{PathsConfig, ScopesConfig};
use crate::error::Result;
use crate::fs::normalize_path;
use crate::types::{ScopeRecord, ScopeType};

const PORT_BASE: u16 = 4000;
const PORT_RANGE: u64 = 10_000;

/// Directory roots whose immediate children are scopes
fn scope_roots(paths: &PathsConfig) -> [(&str, ScopeType, &'static str); 4] {
    [
        (paths.back_services.as_str(), ScopeType::Service, "back:service"),
        (paths.back_libs.as_str(), ScopeType::Lib, "back:lib"),
        (paths.front_apps.as_str(), ScopeType::App, "front:app"),
        (paths.front_packages.as_str(), ScopeType::Package, "front:package"),
    ]
}

/// Stable port derived from the scope id
pub fn deterministic_port(scope_id: &str) -> u16 {
    let hash = scope_id
        .chars()
        .fold(0u64, |acc, c| (acc * 31 + u64::from(c)) % PORT_RANGE);
    // hash < PORT_RANGE, so the sum stays below u16::MAX
    PORT_BASE + hash as u16
}

/// Discover every scope under `repo_root`.
///
/// Children of the configured scope roots come first (sorted by directory
/// name), followed by the contracts, docs and infra scopes when their
/// directories exist, and finally the always-present tooling and global
/// scopes.
#[instrument(skip_all, fields(root = %repo_root.display()))]
pub fn discover_scopes(
    repo_root: &Path,
    paths: &PathsConfig,
    scopes_config: &ScopesConfig,
) -> Result<Vec<ScopeRecord>> {
    let mut result = Vec::new();

    for (root, scope_type, prefix) in scope_roots(paths) {
        let absolute_root = repo_root.join(root);
        if !absolute_root.is_dir() {
            debug!(root, "scope root missing, skipping");
            continue;
        }

        for entry in WalkDir::new(&absolute_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            let id = format!("{}:{}", prefix, name);
            if scopes_config.exclude.contains(&id) {
                debug!(scope = %id, "scope excluded");
                continue;
            }

            let path = normalize_path(&format!("{}/{}", root.trim_end_matches('/'), name));
            let mut scope = ScopeRecord::new(id.clone(), scope_type, path);

            let override_ = scopes_config.overrides.get(&id);
            if let Some(profile) = override_.and_then(|o| o.profile.clone()) {
                scope.profile = profile;
            }
            if let Some(tags) = override_.and_then(|o| o.tags.clone()) {
                scope.tags = tags;
            }
            scope.port = override_.and_then(|o| o.port).or_else(|| {
                (scope_type == ScopeType::Service).then(|| deterministic_port(&id))
            });
            scope.deps = override_.and_then(|o| o.deps.clone());

            result.push(scope);
        }
    }

    for (id, scope_type, relative) in [
        ("contracts:root", ScopeType::Contracts, paths.contracts.as_str()),
        ("docs:root", ScopeType::Docs, paths.docs.as_str()),
        ("infra:root", ScopeType::Infra, paths.infra.as_str()),
    ] {
        if repo_root.join(relative).exists() {
            result.push(ScopeRecord::new(id, scope_type, normalize_path(relative)));
        }
    }

    result.push(ScopeRecord::new("tooling:root", ScopeType::Tooling, "."));
    result.push(ScopeRecord::new("global:root", ScopeType::Global, "."));

    info!(scopes = result.len(), "scope discovery complete");
    Ok(result)
}
