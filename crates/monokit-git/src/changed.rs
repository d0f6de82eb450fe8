//! Changed files between a base ref and HEAD

use std::path::PathBuf;

use git2::Oid;
use tracing::{debug, info, instrument, warn};

use monokit_core::error::GitError;
use monokit_core::{ChangedFilesProvider, ChangedFilesRequest};

use crate::remote::git_fetch_base;
use crate::repository::{GitRepo, Result};

/// [`ChangedFilesProvider`] backed by the repository at `root`
#[derive(Debug, Clone)]
pub struct GitChangedFiles {
    root: PathBuf,
}

impl GitChangedFiles {
    /// Create a provider for the repository containing `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// List files changed between the resolved base and HEAD
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn list(&self, request: &ChangedFilesRequest) -> Result<Vec<String>> {
        let repo = GitRepo::discover(&self.root)?;
        let head = repo.head_commit()?;
        let base = resolve_base(&repo, head, request)?;

        let files = repo.diff_paths(base, head)?;
        info!(base = %base, files = files.len(), "computed changed files");
        Ok(files)
    }

    /// Content of `path` at the base `request` resolves to
    #[instrument(skip(self, request), fields(root = %self.root.display()))]
    pub fn show_at_base(&self, request: &ChangedFilesRequest, path: &str) -> Result<String> {
        let repo = GitRepo::discover(&self.root)?;
        let head = repo.head_commit()?;
        let base = resolve_base(&repo, head, request)?;

        repo.show_file_at(&base.to_string(), path)?
            .ok_or_else(|| GitError::CommandFailed {
                command: format!("show {}:{}", base, path),
                stderr: format!("path '{}' does not exist at base", path),
            })
    }
}

impl ChangedFilesProvider for GitChangedFiles {
    fn changed_files(&self, request: &ChangedFilesRequest) -> monokit_core::Result<Vec<String>> {
        Ok(self.list(request)?)
    }
}

/// Resolve the commit changes are measured from.
///
/// An explicit `since` is used as given. Otherwise the CI base ref, the
/// requested base or the default branch (in that order) is merged with HEAD.
/// When no merge-base can be found and fetching is allowed, the branch is
/// shallow-fetched from the remote and the lookup retried once.
fn resolve_base(repo: &GitRepo, head: Oid, request: &ChangedFilesRequest) -> Result<Oid> {
    if let Some(since) = request.since.as_deref().filter(|s| !s.is_empty()) {
        debug!(since, "using explicit base commit");
        let commit = repo
            .resolve_commit(since)
            .ok_or_else(|| GitError::BaseUnresolved(since.to_string()))?;
        return Ok(repo.merge_base(commit, head).unwrap_or(commit));
    }

    let base = request
        .ci_base_ref
        .as_deref()
        .or(request.base.as_deref())
        .filter(|b| !b.is_empty())
        .unwrap_or(request.default_branch.as_str());

    if let Some(oid) = merge_base_with(repo, head, base, &request.remote) {
        return Ok(oid);
    }

    if !request.allow_fetch_base {
        return Err(GitError::BaseUnresolved(base.to_string()));
    }

    warn!(base, remote = %request.remote, "merge-base not found locally, fetching base");
    git_fetch_base(repo.path(), &request.remote, base)?;

    merge_base_with(repo, head, base, &request.remote)
        .or_else(|| {
            repo.resolve_commit("FETCH_HEAD")
                .and_then(|fetched| repo.merge_base(fetched, head).ok())
        })
        .ok_or_else(|| GitError::BaseUnresolved(base.to_string()))
}

fn merge_base_with(repo: &GitRepo, head: Oid, base: &str, remote: &str) -> Option<Oid> {
    let remote_ref = format!("{}/{}", remote, base);
    let found = [base, remote_ref.as_str()]
        .into_iter()
        .filter_map(|rev| repo.resolve_commit(rev))
        .find_map(|commit| repo.merge_base(commit, head).ok());
    found
}
