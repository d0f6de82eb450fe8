//! Path helpers shared by discovery, caching and task handlers

use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;

/// Replace backslashes with forward slashes
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Render `path` relative to `root` with forward slashes.
///
/// Paths outside `root` are returned whole.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    normalize_path(&relative.to_string_lossy())
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Fail unless `target` resolves to `root` or somewhere beneath it
pub fn assert_path_within_root(root: &Path, target: &Path, label: &str) -> Result<(), ConfigError> {
    let root = lexical_normalize(root);
    let resolved = if target.is_absolute() {
        lexical_normalize(target)
    } else {
        lexical_normalize(&root.join(target))
    };

    if resolved.starts_with(&root) {
        Ok(())
    } else {
        Err(ConfigError::PathOutsideRoot {
            label: label.to_string(),
            target: resolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(r"back\services\alpha"), "back/services/alpha");
        assert_eq!(normalize_path("already/fine"), "already/fine");
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/repo");
        assert_eq!(relative_to(root, Path::new("/repo/a/b.txt")), "a/b.txt");
        assert_eq!(relative_to(root, Path::new("/elsewhere/c")), "/elsewhere/c");
    }

    #[test]
    fn test_path_within_root() {
        let root = Path::new("/repo");
        assert!(assert_path_within_root(root, Path::new("/repo/docs"), "docs root").is_ok());
        assert!(assert_path_within_root(root, Path::new("docs/../contracts"), "spec").is_ok());
        assert!(assert_path_within_root(root, Path::new("/repo"), "root").is_ok());
    }

    #[test]
    fn test_path_outside_root() {
        let root = Path::new("/repo");
        let err = assert_path_within_root(root, Path::new("../etc/passwd"), "docs root").unwrap_err();
        assert!(matches!(err, ConfigError::PathOutsideRoot { .. }));

        assert!(assert_path_within_root(root, Path::new("/repository/x"), "spec").is_err());
    }
}
