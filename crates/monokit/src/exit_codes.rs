//! Exit codes for the CLI

use monokit_core::{ConfigError, ErrorKind, GitError, MonokitError, RunnerError};
use monokit_tasks::{CacheError, GraphError, PipelineError};

/// General error
pub const ERROR: i32 = 1;

/// A wrapped tool exited non-zero; the CLI exits with the same code
#[derive(Debug, thiserror::Error)]
#[error("{command} exited with code {code}")]
pub struct ToolExit {
    pub command: String,
    pub code: i32,
}

/// Classify an error raised by a command, if it came from monokit
pub fn kind_for(err: &anyhow::Error) -> Option<ErrorKind> {
    if err.downcast_ref::<ToolExit>().is_some() {
        return Some(ErrorKind::TaskFailed);
    }
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        return Some(e.kind());
    }
    if let Some(e) = err.downcast_ref::<MonokitError>() {
        return Some(e.kind());
    }
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        return Some(e.kind());
    }
    if err.downcast_ref::<GitError>().is_some() {
        return Some(ErrorKind::Git);
    }
    if let Some(e) = err.downcast_ref::<RunnerError>() {
        return Some(e.kind());
    }
    if err.downcast_ref::<GraphError>().is_some() {
        return Some(ErrorKind::InvalidConfig);
    }
    if err.downcast_ref::<CacheError>().is_some() {
        return Some(ErrorKind::Io);
    }
    None
}

/// Process exit code for an error raised by a command
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ToolExit>() {
        return exit.code;
    }
    kind_for(err).map(|k| k.exit_code()).unwrap_or(ERROR)
}
