//! Git repository operations

use std::path::{Path, PathBuf};

use git2::{Oid, Repository};
use tracing::{debug, instrument};

use monokit_core::error::GitError;
use monokit_core::fs::normalize_path;

/// Result type for git operations
pub type Result<T> = std::result::Result<T, GitError>;

/// Git repository wrapper
pub struct GitRepo {
    pub(crate) repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Open a repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::NotARepository(path.to_path_buf())
            } else {
                GitError::Git2(e)
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            repo,
        })
    }

    /// Discover and open a repository by searching parent directories
    #[instrument(fields(start_path = %start_path.display()))]
    pub fn discover(start_path: &Path) -> Result<Self> {
        let repo = Repository::discover(start_path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::NotARepository(start_path.to_path_buf())
            } else {
                GitError::Git2(e)
            }
        })?;

        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        debug!(path = %path.display(), "opened git repository");

        Ok(Self { repo, path })
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the HEAD commit id
    pub fn head_commit(&self) -> Result<Oid> {
        let head = self.repo.head()?;
        Ok(head.peel_to_commit()?.id())
    }

    /// Resolve a revision (sha, branch, tag, `remote/branch`) to a commit id
    pub fn resolve_commit(&self, rev: &str) -> Option<Oid> {
        self.repo
            .revparse_single(rev)
            .and_then(|object| object.peel_to_commit())
            .map(|commit| commit.id())
            .ok()
    }

    /// Best common ancestor of two commits
    pub fn merge_base(&self, one: Oid, two: Oid) -> Result<Oid> {
        Ok(self.repo.merge_base(one, two)?)
    }

    /// Files that differ between the trees of two commits.
    ///
    /// Deleted files are reported by their old path. Paths use forward
    /// slashes.
    pub fn diff_paths(&self, from: Oid, to: Oid) -> Result<Vec<String>> {
        let from_tree = self.repo.find_commit(from)?.tree()?;
        let to_tree = self.repo.find_commit(to)?.tree()?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), None)?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            let path = delta.new_file().path().or_else(|| delta.old_file().path());
            if let Some(path) = path {
                files.push(normalize_path(&path.to_string_lossy()));
            }
        }
        Ok(files)
    }

    /// Content of `path` at revision `rev`, or `None` when the file does not
    /// exist there
    pub fn show_file_at(&self, rev: &str, path: &str) -> Result<Option<String>> {
        let spec = format!("{}:{}", rev, normalize_path(path));
        let object = match self.repo.revparse_single(&spec) {
            Ok(object) => object,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob = object.peel_to_blob()?;
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }
}
