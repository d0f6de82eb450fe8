//! Error types for monokit

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using MonokitError
pub type Result<T> = std::result::Result<T, MonokitError>;

/// Machine-readable classification of a failure.
///
/// Every error raised by the core maps onto one of these kinds, and each kind
/// has a stable process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A dispatched task returned a non-zero exit code
    TaskFailed,
    /// Configuration is invalid (unknown pipeline/profile/task, cycles, bad values)
    InvalidConfig,
    /// The container runner could not be found or launched
    RunnerMissing,
    /// Git could not be used to compute changes
    Git,
    /// No repository root / configuration file was found
    RootNotFound,
    /// Filesystem or serialization failure
    Io,
}

impl ErrorKind {
    /// Process exit code for this kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::TaskFailed => 1,
            Self::InvalidConfig => 2,
            Self::RunnerMissing => 3,
            Self::Git => 4,
            Self::RootNotFound => 5,
            Self::Io => 1,
        }
    }

    /// Short stable identifier, used in JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskFailed => "task_failed",
            Self::InvalidConfig => "invalid_config",
            Self::RunnerMissing => "runner_missing",
            Self::Git => "git",
            Self::RootNotFound => "root_not_found",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for monokit operations
#[derive(Debug, Error)]
pub enum MonokitError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Git-related errors
    #[error(transparent)]
    Git(#[from] GitError),

    /// Container runner errors
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl MonokitError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Git(_) => ErrorKind::Git,
            Self::Runner(e) => e.kind(),
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Io,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found from {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Pipeline name not declared in `tasks.pipelines`
    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),

    /// Scope references a profile not declared in `tasks.profiles`
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// Task id not handled by its domain handler
    #[error("Unsupported task: {0}")]
    UnsupportedTask(String),

    /// Task cannot run against the given scope
    #[error("Task {task} cannot run on scope {scope}: {message}")]
    ScopeMismatch {
        task: String,
        scope: String,
        message: String,
    },

    /// A resolved path escapes the repository root
    #[error("Invalid {label} outside repository root: {}", target.display())]
    PathOutsideRoot { label: String, target: PathBuf },

    /// A file required by a task does not exist
    #[error("{label} not found at {}", path.display())]
    MissingFile { label: String, path: PathBuf },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::RootNotFound,
            Self::Io(_) => ErrorKind::Io,
            _ => ErrorKind::InvalidConfig,
        }
    }
}

/// Git-related errors
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a git repository
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    /// Neither merge-base nor fetch could resolve the base ref
    #[error("Unable to resolve git base: {0}")]
    BaseUnresolved(String),

    /// Fetching the base branch from the remote failed
    #[error("Unable to fetch git base {base}: {stderr}")]
    FetchFailed { base: String, stderr: String },

    /// A git command exited unsuccessfully
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// Failed to spawn git
    #[error("Failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

/// Container runner errors
///
/// A non-zero exit is never a runner error; it is reported as a value.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The runner binary is not installed
    #[error("Missing required command: {0}")]
    Missing(String),

    /// The process could not be launched at all
    #[error("Failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An empty argument vector was passed
    #[error("Missing command")]
    EmptyCommand,
}

impl RunnerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Missing(_) | Self::Launch { .. } => ErrorKind::RunnerMissing,
            Self::EmptyCommand => ErrorKind::TaskFailed,
        }
    }
}
