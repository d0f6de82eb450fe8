//! Core types for monokit

use serde::{Deserialize, Serialize};

/// Kind of scope discovered in the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    /// Backend service
    Service,
    /// Backend library
    Lib,
    /// Frontend application
    App,
    /// Frontend package
    Package,
    /// Contract (OpenAPI) sources
    Contracts,
    /// Documentation site
    Docs,
    /// Repository tooling
    Tooling,
    /// Infrastructure definitions
    Infra,
    /// The repository as a whole
    Global,
}

impl ScopeType {
    /// Returns the string representation of the scope type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Lib => "lib",
            Self::App => "app",
            Self::Package => "package",
            Self::Contracts => "contracts",
            Self::Docs => "docs",
            Self::Tooling => "tooling",
            Self::Infra => "infra",
            Self::Global => "global",
        }
    }
}

impl std::fmt::Display for ScopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScopeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "lib" => Ok(Self::Lib),
            "app" => Ok(Self::App),
            "package" => Ok(Self::Package),
            "contracts" => Ok(Self::Contracts),
            "docs" => Ok(Self::Docs),
            "tooling" => Ok(Self::Tooling),
            "infra" => Ok(Self::Infra),
            "global" => Ok(Self::Global),
            _ => Err(format!("Unknown scope type: {}", s)),
        }
    }
}

/// One independently buildable unit of the monorepo.
///
/// Records are produced once per invocation by discovery and are not mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRecord {
    /// Stable identifier, e.g. `back:service:alpha`
    pub id: String,
    /// Scope kind
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    /// Repository-relative path using forward slashes
    pub path: String,
    /// Key into `tasks.profiles`
    pub profile: String,
    /// Free-form tags used for selection
    #[serde(default)]
    pub tags: Vec<String>,
    /// Service port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Other scope ids this scope depends on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<Vec<String>>,
}

impl ScopeRecord {
    /// Create a scope with the `default` profile and no tags
    pub fn new(id: impl Into<String>, scope_type: ScopeType, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope_type,
            path: path.into(),
            profile: "default".to_string(),
            tags: Vec::new(),
            port: None,
            deps: None,
        }
    }

    /// Set the profile
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Whether the scope carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Last `:`-separated segment of the id (`back:service:alpha` -> `alpha`)
    pub fn short_name(&self) -> &str {
        self.id.rsplit(':').next().unwrap_or(&self.id)
    }
}
