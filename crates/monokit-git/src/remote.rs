//! Remote operations

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::repository::Result;
use monokit_core::error::GitError;

/// Shallow-fetch a single branch using the git CLI.
///
/// The CLI is used rather than libgit2 so that the user's credential helpers
/// and SSH configuration apply.
#[instrument(fields(cwd = %cwd.display()))]
pub fn git_fetch_base(cwd: &Path, remote: &str, base: &str) -> Result<()> {
    let start = std::time::Instant::now();
    let output = std::process::Command::new("git")
        .args(["fetch", remote, base, "--depth=1"])
        .current_dir(cwd)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(remote, base, stderr = %stderr, "git fetch failed");
        return Err(GitError::FetchFailed {
            base: base.to_string(),
            stderr,
        });
    }

    info!(
        remote,
        base,
        duration_ms = start.elapsed().as_millis(),
        "fetched base branch (CLI)"
    );
    Ok(())
}
