//! Monorepo scope handling
//!
//! - Scope discovery from the directory layout
//! - Mapping changed files onto scopes
//! - Resolving a user selection into the scopes a pipeline runs against

pub mod changes;
pub mod discovery;
pub mod selection;

pub use changes::{map_changed_files_to_scopes, ChangeToken};
pub use discovery::{deterministic_port, discover_scopes};
pub use selection::{select_scopes, ChangedFilesProvider, ChangedFilesRequest, Selection};
