//! monokit Core - scope model, configuration and scope selection
//!
//! This crate provides the types shared by every monokit component: the
//! scope model, the validated configuration, the error taxonomy, and the
//! change-detection and scope-selection logic that decides which scopes a
//! pipeline runs against.

pub mod config;
pub mod error;
pub mod fs;
pub mod monorepo;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, ErrorKind, GitError, MonokitError, Result, RunnerError};
pub use monorepo::changes::{map_changed_files_to_scopes, ChangeToken};
pub use monorepo::discovery::discover_scopes;
pub use monorepo::selection::{select_scopes, ChangedFilesProvider, ChangedFilesRequest, Selection};
pub use types::{ScopeRecord, ScopeType};
