//! monokit Git - change detection for monorepo pipelines
//!
//! Resolves the base a change is measured from (explicit commit, CI target
//! branch, or the merge-base with a branch) and lists the files changed
//! between that base and HEAD.

mod changed;
mod remote;
mod repository;

pub use changed::GitChangedFiles;
pub use remote::git_fetch_base;
pub use repository::{GitRepo, Result};
