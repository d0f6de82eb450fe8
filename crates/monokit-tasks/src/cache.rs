//! Content-addressable task cache
//!
//! One JSON file per repository records, for every `(scope, task)` pair that
//! last succeeded, the hash of its inputs and the outputs it produced. A task
//! is skipped when its inputs hash the same and all recorded outputs are
//! still on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use monokit_core::config::{TaskDefinition, CACHE_ROOT};
use monokit_core::fs::{lexical_normalize, relative_to};
use monokit_core::ScopeRecord;

/// On-disk format version
pub const CACHE_VERSION: u32 = 1;

const CACHE_FILE: &str = "cache/tasks.json";

/// Recorded result of a successful cacheable task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCacheEntry {
    /// Hash of the task inputs when it last succeeded
    pub input_hash: String,
    /// Repository-relative output files
    pub outputs: Vec<String>,
}

/// The whole cache file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCacheFile {
    /// Format version
    pub version: u32,
    /// scope id -> task id -> entry
    pub scopes: BTreeMap<String, BTreeMap<String, TaskCacheEntry>>,
}

impl Default for TaskCacheFile {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            scopes: BTreeMap::new(),
        }
    }
}

/// Hash of a task's resolved input files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputsHash {
    /// Hex SHA-256, empty when no input matched
    pub hash: String,
    /// Repository-relative input files, sorted
    pub inputs: Vec<String>,
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCheck {
    /// Inputs unchanged and outputs present; the task can be skipped
    Hit,
    /// The task must run; record `hash` if it succeeds
    Miss {
        /// Current input hash
        hash: String,
    },
    /// Caching does not apply to this task in this run
    Uncacheable,
}

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Cache serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input or output pattern
    #[error("Invalid cache pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

fn glob_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Glob text for `full`, with the literal `base` prefix escaped
fn escape_prefix(base: &Path, full: &Path) -> Option<String> {
    let rest = full.strip_prefix(base).ok()?;
    let escaped = PathBuf::from(Pattern::escape(&base.to_string_lossy()));
    Some(escaped.join(rest).to_string_lossy().into_owned())
}

/// Expand task patterns into the files they match.
///
/// Relative patterns are resolved against the scope directory. Only regular
/// files are returned, deduplicated and sorted by their repository-relative
/// path.
fn resolve_patterns(
    repo_root: &Path,
    scope: &ScopeRecord,
    patterns: &[String],
) -> Result<Vec<String>, CacheError> {
    let root = lexical_normalize(repo_root);
    let scope_dir = lexical_normalize(&repo_root.join(&scope.path));
    let mut files = Vec::new();

    for pattern in patterns {
        let full = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            // The checkout path is literal even when it contains glob metacharacters.
            let joined = lexical_normalize(&scope_dir.join(pattern));
            escape_prefix(&scope_dir, &joined)
                .or_else(|| escape_prefix(&root, &joined))
                .unwrap_or_else(|| joined.to_string_lossy().into_owned())
        };

        let paths = glob::glob_with(&full, glob_options()).map_err(|source| CacheError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        for entry in paths {
            let path = entry.map_err(|e| CacheError::Io(e.into()))?;
            if path.is_file() {
                files.push(relative_to(&root, &path));
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn absolute(repo_root: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}

/// Hash the files matched by the task's `inputs`.
///
/// Each file contributes its repository-relative path and its bytes, both
/// length-prefixed, in sorted path order, so the result does not depend on glob expansion order.
pub fn compute_task_inputs_hash(
    repo_root: &Path,
    scope: &ScopeRecord,
    task: &TaskDefinition,
) -> Result<InputsHash, CacheError> {
    let inputs = resolve_patterns(repo_root, scope, &task.inputs)?;
    if inputs.is_empty() {
        return Ok(InputsHash {
            hash: String::new(),
            inputs,
        });
    }

    let mut hasher = Sha256::new();
    for file in &inputs {
        let contents = fs::read(absolute(repo_root, file))?;
        hasher.update((file.len() as u64).to_le_bytes());
        hasher.update(file.as_bytes());
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }

    Ok(InputsHash {
        hash: format!("{:x}", hasher.finalize()),
        inputs,
    })
}

/// Resolve the files matched by the task's `outputs`, sorted
pub fn resolve_task_outputs(
    repo_root: &Path,
    scope: &ScopeRecord,
    task: &TaskDefinition,
) -> Result<Vec<String>, CacheError> {
    resolve_patterns(repo_root, scope, &task.outputs)
}

/// Directories under the cache root every command may write to
pub const CACHE_LAYOUT: [&str; 5] = ["cache", "cache/oas", "reports", "reports/openapi", "tmp"];

/// Create the cache directory layout, returning the cache root
pub fn ensure_cache_layout(repo_root: &Path) -> Result<PathBuf, CacheError> {
    let root = repo_root.join(CACHE_ROOT);
    for dir in CACHE_LAYOUT {
        fs::create_dir_all(root.join(dir))?;
    }
    Ok(root)
}

/// Location of the cache file for a repository
pub fn cache_file_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CACHE_ROOT).join(CACHE_FILE)
}

/// In-memory task cache shared by every pipeline worker.
///
/// The file is read once by [`TaskCache::load`] and written once by
/// [`TaskCache::save`]; workers only touch the map in between.
#[derive(Debug)]
pub struct TaskCache {
    repo_root: PathBuf,
    file: Mutex<TaskCacheFile>,
}

impl TaskCache {
    /// Create an empty cache for `repo_root`
    pub fn empty(repo_root: &Path) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            file: Mutex::new(TaskCacheFile::default()),
        }
    }

    /// Load the cache file.
    ///
    /// A missing, unreadable, corrupt or wrong-version file yields an empty
    /// cache.
    #[instrument(fields(root = %repo_root.display()))]
    pub fn load(repo_root: &Path) -> Self {
        let path = cache_file_path(repo_root);
        let file = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<TaskCacheFile>(&raw) {
                Ok(parsed) if parsed.version == CACHE_VERSION => {
                    debug!(scopes = parsed.scopes.len(), "loaded task cache");
                    parsed
                }
                Ok(parsed) => {
                    warn!(version = parsed.version, "unsupported task cache version, starting cold");
                    TaskCacheFile::default()
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "corrupt task cache, starting cold");
                    TaskCacheFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TaskCacheFile::default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "unreadable task cache, starting cold");
                TaskCacheFile::default()
            }
        };

        Self {
            repo_root: repo_root.to_path_buf(),
            file: Mutex::new(file),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TaskCacheFile> {
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decide whether `task` can be skipped for `scope`
    pub fn check(
        &self,
        scope: &ScopeRecord,
        task_id: &str,
        task: &TaskDefinition,
    ) -> Result<CacheCheck, CacheError> {
        if !task.is_cacheable() {
            return Ok(CacheCheck::Uncacheable);
        }

        let current = compute_task_inputs_hash(&self.repo_root, scope, task)?;
        if current.hash.is_empty() {
            debug!(scope = %scope.id, task = task_id, "no inputs matched, not caching");
            return Ok(CacheCheck::Uncacheable);
        }

        let stored = self.get(&scope.id, task_id);
        let hit = stored.is_some_and(|entry| {
            entry.input_hash == current.hash
                && !entry.outputs.is_empty()
                && entry
                    .outputs
                    .iter()
                    .all(|output| absolute(&self.repo_root, output).exists())
        });

        if hit {
            debug!(scope = %scope.id, task = task_id, "cache hit");
            Ok(CacheCheck::Hit)
        } else {
            debug!(scope = %scope.id, task = task_id, "cache miss");
            Ok(CacheCheck::Miss { hash: current.hash })
        }
    }

    /// Look up the entry for `(scope_id, task_id)`
    pub fn get(&self, scope_id: &str, task_id: &str) -> Option<TaskCacheEntry> {
        self.lock()
            .scopes
            .get(scope_id)
            .and_then(|tasks| tasks.get(task_id))
            .cloned()
    }

    /// Overwrite the entry for `(scope_id, task_id)`
    pub fn record(&self, scope_id: &str, task_id: &str, entry: TaskCacheEntry) {
        self.lock()
            .scopes
            .entry(scope_id.to_string())
            .or_default()
            .insert(task_id.to_string(), entry);
    }

    /// Snapshot of the current contents
    pub fn snapshot(&self) -> TaskCacheFile {
        self.lock().clone()
    }

    /// Write the cache file
    #[instrument(skip(self), fields(root = %self.repo_root.display()))]
    pub fn save(&self) -> Result<(), CacheError> {
        let path = cache_file_path(&self.repo_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(&path, format!("{}\n", json))?;
        debug!(path = %path.display(), "saved task cache");
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Default, Serialize)]
pub struct CacheStats {
    /// Whether the cache file exists
    pub exists: bool,
    /// Scopes with at least one entry
    pub scopes: usize,
    /// Total entries
    pub entries: usize,
    /// File size in bytes
    pub total_size: u64,
}

impl CacheStats {
    /// Format total size in human-readable form
    pub fn formatted_size(&self) -> String {
        if self.total_size < 1024 {
            format!("{} B", self.total_size)
        } else if self.total_size < 1024 * 1024 {
            format!("{:.1} KB", self.total_size as f64 / 1024.0)
        } else {
            format!("{:.1} MB", self.total_size as f64 / (1024.0 * 1024.0))
        }
    }
}

/// Inspect the cache file of `repo_root`
pub fn cache_status(repo_root: &Path) -> CacheStats {
    let path = cache_file_path(repo_root);
    let Ok(meta) = fs::metadata(&path) else {
        return CacheStats::default();
    };

    let file = TaskCache::load(repo_root).snapshot();
    CacheStats {
        exists: true,
        scopes: file.scopes.len(),
        entries: file.scopes.values().map(BTreeMap::len).sum(),
        total_size: meta.len(),
    }
}

/// Remove the cache file. Returns whether a file was removed.
pub fn clean_cache(repo_root: &Path) -> Result<bool, CacheError> {
    let path = cache_file_path(repo_root);
    match fs::remove_file(&path) {
        Ok(()) => {
            info!(path = %path.display(), "removed task cache");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monokit_core::ScopeType;
    use tempfile::TempDir;

    fn scope() -> ScopeRecord {
        ScopeRecord::new("front:app:web", ScopeType::App, "front/apps/web")
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn build_task() -> TaskDefinition {
        TaskDefinition::new(["build"]).with_cache(
            vec!["src/**/*".to_string(), "package.json".to_string()],
            vec!["dist/**/*".to_string()],
        )
    }

    #[test]
    fn test_inputs_hash_is_sorted_and_stable() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "front/apps/web/src/b.ts", "b");
        write(temp.path(), "front/apps/web/src/a.ts", "a");
        write(temp.path(), "front/apps/web/package.json", "{}");

        let forward = TaskDefinition::new(["build"]).with_cache(
            vec!["src/a.ts".to_string(), "src/b.ts".to_string(), "package.json".to_string()],
            vec!["dist/**".to_string()],
        );
        let reversed = TaskDefinition::new(["build"]).with_cache(
            vec!["package.json".to_string(), "src/b.ts".to_string(), "src/**/*".to_string()],
            vec!["dist/**".to_string()],
        );

        let one = compute_task_inputs_hash(temp.path(), &scope(), &forward).unwrap();
        let two = compute_task_inputs_hash(temp.path(), &scope(), &reversed).unwrap();

        assert_eq!(one, two);
        assert_eq!(
            one.inputs,
            vec![
                "front/apps/web/package.json",
                "front/apps/web/src/a.ts",
                "front/apps/web/src/b.ts",
            ]
        );
        assert_eq!(one.hash.len(), 64);
    }

    #[test]
    fn test_inputs_hash_changes_with_content() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "front/apps/web/src/a.ts", "a");
        let before = compute_task_inputs_hash(temp.path(), &scope(), &build_task()).unwrap();

        write(temp.path(), "front/apps/web/src/a.ts", "changed");
        let after = compute_task_inputs_hash(temp.path(), &scope(), &build_task()).unwrap();

        assert_ne!(before.hash, after.hash);
    }

    #[test]
    fn test_repo_root_with_glob_metacharacters() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo[1]");
        write(&root, "front/apps/web/src/a.ts", "a");
        write(&root, "front/apps/web/dist/app.js", "js");

        let hash = compute_task_inputs_hash(&root, &scope(), &build_task()).unwrap();
        assert_eq!(hash.inputs, vec!["front/apps/web/src/a.ts"]);
        assert_eq!(hash.hash.len(), 64);

        let outputs = resolve_task_outputs(&root, &scope(), &build_task()).unwrap();
        assert_eq!(outputs, vec!["front/apps/web/dist/app.js"]);
    }

    #[test]
    fn test_path_and_content_boundaries_are_hashed() {
        let one = TempDir::new().unwrap();
        write(one.path(), "front/apps/web/src/x/a", "bc");
        let two = TempDir::new().unwrap();
        write(two.path(), "front/apps/web/src/x/ab", "c");

        let first = compute_task_inputs_hash(one.path(), &scope(), &build_task()).unwrap();
        let second = compute_task_inputs_hash(two.path(), &scope(), &build_task()).unwrap();
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn test_dotfiles_are_inputs() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "front/apps/web/src/.env.example", "X=1");
        let hash = compute_task_inputs_hash(temp.path(), &scope(), &build_task()).unwrap();
        assert_eq!(hash.inputs, vec!["front/apps/web/src/.env.example"]);
    }

    #[test]
    fn test_no_inputs_is_empty_hash() {
        let temp = TempDir::new().unwrap();
        let hash = compute_task_inputs_hash(temp.path(), &scope(), &build_task()).unwrap();
        assert!(hash.hash.is_empty());
        assert!(hash.inputs.is_empty());
    }

    #[test]
    fn test_ensure_cache_layout() {
        let temp = TempDir::new().unwrap();
        let root = ensure_cache_layout(temp.path()).unwrap();
        assert_eq!(root, temp.path().join(".cache/monokit"));
        for dir in CACHE_LAYOUT {
            assert!(root.join(dir).is_dir(), "{dir} missing");
        }
        assert!(ensure_cache_layout(temp.path()).is_ok());
    }

    #[test]
    fn test_miss_then_hit() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "front/apps/web/src/a.ts", "a");
        let cache = TaskCache::load(temp.path());
        let task = build_task();

        let CacheCheck::Miss { hash } = cache.check(&scope(), "build", &task).unwrap() else {
            panic!("expected a miss");
        };

        write(temp.path(), "front/apps/web/dist/index.js", "out");
        let outputs = resolve_task_outputs(temp.path(), &scope(), &task).unwrap();
        assert_eq!(outputs, vec!["front/apps/web/dist/index.js"]);
        cache.record("front:app:web", "build", TaskCacheEntry { input_hash: hash, outputs });

        assert_eq!(cache.check(&scope(), "build", &task).unwrap(), CacheCheck::Hit);
    }

    #[test]
    fn test_missing_output_is_a_miss() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "front/apps/web/src/a.ts", "a");
        let cache = TaskCache::load(temp.path());
        let task = build_task();
        let hash = compute_task_inputs_hash(temp.path(), &scope(), &task).unwrap().hash;

        cache.record(
            "front:app:web",
            "build",
            TaskCacheEntry {
                input_hash: hash,
                outputs: vec!["front/apps/web/dist/index.js".to_string()],
            },
        );
        assert!(matches!(
            cache.check(&scope(), "build", &task).unwrap(),
            CacheCheck::Miss { .. }
        ));
    }

    #[test]
    fn test_empty_recorded_outputs_is_a_miss() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "front/apps/web/src/a.ts", "a");
        let cache = TaskCache::load(temp.path());
        let task = build_task();
        let hash = compute_task_inputs_hash(temp.path(), &scope(), &task).unwrap().hash;

        cache.record(
            "front:app:web",
            "build",
            TaskCacheEntry {
                input_hash: hash,
                outputs: Vec::new(),
            },
        );
        assert!(matches!(
            cache.check(&scope(), "build", &task).unwrap(),
            CacheCheck::Miss { .. }
        ));
    }

    #[test]
    fn test_uncacheable_tasks() {
        let temp = TempDir::new().unwrap();
        let cache = TaskCache::empty(temp.path());

        let plain = TaskDefinition::new(["lint"]);
        assert_eq!(cache.check(&scope(), "lint", &plain).unwrap(), CacheCheck::Uncacheable);

        let no_outputs = TaskDefinition::new(["build"]).with_cache(vec!["src/**".to_string()], Vec::new());
        assert_eq!(
            cache.check(&scope(), "build", &no_outputs).unwrap(),
            CacheCheck::Uncacheable
        );
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let cache = TaskCache::load(temp.path());
        cache.record(
            "front:app:web",
            "build",
            TaskCacheEntry {
                input_hash: "abc".to_string(),
                outputs: vec!["front/apps/web/dist/index.js".to_string()],
            },
        );
        cache.save().unwrap();

        let raw = fs::read_to_string(cache_file_path(temp.path())).unwrap();
        assert!(raw.contains("\"inputHash\": \"abc\""));
        assert!(raw.contains("\"version\": 1"));

        let reloaded = TaskCache::load(temp.path());
        assert_eq!(reloaded.get("front:app:web", "build").unwrap().input_hash, "abc");
    }

    #[test]
    fn test_corrupt_cache_starts_cold() {
        let temp = TempDir::new().unwrap();
        let path = cache_file_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let cache = TaskCache::load(temp.path());
        assert!(cache.snapshot().scopes.is_empty());

        fs::write(&path, r#"{"version": 2, "scopes": {"a": {}}}"#).unwrap();
        assert!(TaskCache::load(temp.path()).snapshot().scopes.is_empty());
    }

    #[test]
    fn test_status_and_clean() {
        let temp = TempDir::new().unwrap();
        assert!(!cache_status(temp.path()).exists);
        assert!(!clean_cache(temp.path()).unwrap());

        let cache = TaskCache::empty(temp.path());
        cache.record(
            "a",
            "build",
            TaskCacheEntry {
                input_hash: "h".to_string(),
                outputs: vec!["out".to_string()],
            },
        );
        cache.save().unwrap();

        let stats = cache_status(temp.path());
        assert!(stats.exists);
        assert_eq!(stats.scopes, 1);
        assert_eq!(stats.entries, 1);
        assert!(stats.total_size > 0);

        assert!(clean_cache(temp.path()).unwrap());
        assert!(!cache_file_path(temp.path()).exists());
    }

    #[test]
    fn test_cache_stats_formatted_size() {
        let stats = CacheStats {
            total_size: 1536,
            ..Default::default()
        };
        assert_eq!(stats.formatted_size(), "1.5 KB");
    }
}
