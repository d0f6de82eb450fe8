//! Change detection for monorepos
//!
//! Maps the files touched by a change onto the scopes they belong to. Besides
//! real scope ids the result may contain synthetic tokens that signal a
//! broader impact (see [`ChangeToken`]).

use std::collections::HashSet;

use tracing::debug;

use crate::config::ChangedConfig;
use crate::fs::normalize_path;
use crate::types::ScopeRecord;

/// Synthetic markers produced by change detection
pub struct ChangeToken;

impl ChangeToken {
    /// A tooling file changed; every scope is affected
    pub const ALL: &'static str = "__ALL__";
    /// A contract changed; every service is affected
    pub const CONTRACTS: &'static str = "__CONTRACTS__";
    /// Documentation changed; every docs scope is affected
    pub const DOCS: &'static str = "__DOCS__";

    /// Whether `entry` is a synthetic token rather than a scope id
    pub fn is_token(entry: &str) -> bool {
        entry.starts_with("__")
    }
}

/// Map changed files to affected scope ids and change tokens.
///
/// Each file is tested in priority order: tooling prefixes, the contracts
/// prefix, the docs prefix, then the first scope whose `path/` prefixes it.
/// Files matching nothing are ignored. If any tooling file changed the result
/// is exactly `["__ALL__"]`.
pub fn map_changed_files_to_scopes(
    changed_files: &[String],
    scopes: &[ScopeRecord],
    config: &ChangedConfig,
) -> Vec<String> {
    let tooling_prefixes: Vec<String> = config
        .tooling_prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| normalize_path(p))
        .collect();
    let contracts_prefix = normalize_path(&config.contracts_prefix);
    let docs_prefix = normalize_path(&config.docs_prefix);
    let scope_prefixes: Vec<(String, &str)> = scopes
        .iter()
        .map(|s| (format!("{}/", normalize_path(&s.path)), s.id.as_str()))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut result: Vec<String> = Vec::new();
    let mut contracts = false;
    let mut docs = false;

    for file in changed_files {
        let file = normalize_path(file);

        if tooling_prefixes.iter().any(|p| file.starts_with(p.as_str())) {
            debug!(file = %file, "tooling change affects all scopes");
            return vec![ChangeToken::ALL.to_string()];
        }
        if !contracts_prefix.is_empty() && file.starts_with(&contracts_prefix) {
            contracts = true;
            continue;
        }
        if !docs_prefix.is_empty() && file.starts_with(&docs_prefix) {
            docs = true;
            continue;
        }

        if let Some((_, id)) = scope_prefixes
            .iter()
            .find(|(prefix, _)| file.starts_with(prefix.as_str()))
        {
            if seen.insert(*id) {
                result.push((*id).to_string());
            }
        }
    }

    if contracts {
        result.push(ChangeToken::CONTRACTS.to_string());
    }
    if docs {
        result.push(ChangeToken::DOCS.to_string());
    }

    debug!(
        files = changed_files.len(),
        affected = result.len(),
        "mapped changed files to scopes"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScopeType;

    fn scopes() -> Vec<ScopeRecord> {
        vec![ScopeRecord::new(
            "back:service:alpha",
            ScopeType::Service,
            "back/services/alpha",
        )]
    }

    fn config() -> ChangedConfig {
        ChangedConfig {
            tooling_prefixes: vec!["config/".to_string()],
            contracts_prefix: "contracts/".to_string(),
            docs_prefix: "docs/".to_string(),
        }
    }

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_maps_scopes_and_tokens() {
        let result = map_changed_files_to_scopes(
            &files(&[
                "contracts/spec.yaml",
                "docs/readme.md",
                "back/services/alpha/src/index.ts",
            ]),
            &scopes(),
            &config(),
        );

        let set: HashSet<&str> = result.iter().map(String::as_str).collect();
        let expected: HashSet<&str> = ["back:service:alpha", "__CONTRACTS__", "__DOCS__"]
            .into_iter()
            .collect();
        assert_eq!(set, expected);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_tooling_change_is_all() {
        let result = map_changed_files_to_scopes(
            &files(&["config/tools/biome/biome.base.jsonc"]),
            &scopes(),
            &config(),
        );
        assert_eq!(result, vec!["__ALL__"]);
    }

    #[test]
    fn test_tooling_change_suppresses_everything_else() {
        let result = map_changed_files_to_scopes(
            &files(&[
                "back/services/alpha/src/index.ts",
                "docs/readme.md",
                "config/tools/biome/biome.base.jsonc",
                "contracts/spec.yaml",
            ]),
            &scopes(),
            &config(),
        );
        assert_eq!(result, vec!["__ALL__"]);
    }

    #[test]
    fn test_unmatched_files_are_ignored() {
        let result =
            map_changed_files_to_scopes(&files(&["README.md", "back/other/x.ts"]), &scopes(), &config());
        assert!(result.is_empty());
    }

    #[test]
    fn test_scope_prefix_requires_separator() {
        let result = map_changed_files_to_scopes(
            &files(&["back/services/alphabet/src/main.rs"]),
            &scopes(),
            &config(),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_backslashes_are_normalized() {
        let result = map_changed_files_to_scopes(
            &files(&[r"back\services\alpha\src\index.ts"]),
            &scopes(),
            &config(),
        );
        assert_eq!(result, vec!["back:service:alpha"]);
    }

    #[test]
    fn test_results_are_deduplicated() {
        let result = map_changed_files_to_scopes(
            &files(&[
                "back/services/alpha/a.ts",
                "back/services/alpha/b.ts",
                "docs/a.md",
                "docs/b.md",
            ]),
            &scopes(),
            &config(),
        );
        assert_eq!(result, vec!["back:service:alpha", "__DOCS__"]);
    }

    #[test]
    fn test_empty_prefixes_are_disabled() {
        let config = ChangedConfig {
            tooling_prefixes: vec![String::new()],
            contracts_prefix: String::new(),
            docs_prefix: String::new(),
        };
        let result = map_changed_files_to_scopes(
            &files(&["contracts/spec.yaml", "back/services/alpha/a.ts"]),
            &scopes(),
            &config,
        );
        assert_eq!(result, vec!["back:service:alpha"]);
    }

    #[test]
    fn test_is_token() {
        assert!(ChangeToken::is_token(ChangeToken::ALL));
        assert!(ChangeToken::is_token(ChangeToken::DOCS));
        assert!(!ChangeToken::is_token("back:service:alpha"));
    }
}
