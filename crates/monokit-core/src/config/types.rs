//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration for monokit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Version of the config schema
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Where scopes live in the repository
    pub paths: PathsConfig,

    /// Change detection prefixes
    pub changed: ChangedConfig,

    /// Git configuration
    pub git: GitConfig,

    /// Container runner configuration
    pub docker: DockerConfig,

    /// Task orchestration configuration
    pub tasks: TasksConfig,

    /// Contract (OpenAPI) task configuration
    pub contracts: ContractsConfig,

    /// Documentation task configuration
    pub docs: DocsConfig,

    /// Per-scope overrides and exclusions
    pub scopes: ScopesConfig,
}

/// Repository layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory whose children are backend services
    pub back_services: String,
    /// Directory whose children are backend libraries
    pub back_libs: String,
    /// Directory whose children are frontend apps
    pub front_apps: String,
    /// Directory whose children are frontend packages
    pub front_packages: String,
    /// Contracts directory
    pub contracts: String,
    /// Documentation directory
    pub docs: String,
    /// Infrastructure directory
    pub infra: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            back_services: "back/services".to_string(),
            back_libs: "back/libs".to_string(),
            front_apps: "front/apps".to_string(),
            front_packages: "front/packages".to_string(),
            contracts: "contracts".to_string(),
            docs: "docs".to_string(),
            infra: "infra".to_string(),
        }
    }
}

/// Prefix rules for mapping changed files to scopes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangedConfig {
    /// Changes under any of these prefixes affect every scope
    pub tooling_prefixes: Vec<String>,
    /// Changes under this prefix affect every service
    pub contracts_prefix: String,
    /// Changes under this prefix affect every docs scope
    pub docs_prefix: String,
}

impl Default for ChangedConfig {
    fn default() -> Self {
        Self {
            tooling_prefixes: vec!["config/".to_string()],
            contracts_prefix: "contracts/".to_string(),
            docs_prefix: "docs/".to_string(),
        }
    }
}

/// Git configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Branch compared against when no base is given
    pub default_branch: String,

    /// Whether a shallow fetch of the base branch may be attempted
    pub allow_fetch_base: bool,

    /// Remote fetched from
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            allow_fetch_base: false,
            remote: "origin".to_string(),
        }
    }
}

/// Container runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Compose file, relative to the repository root
    pub compose_file: String,
    /// Compose service tasks run in
    pub service: String,
    /// Entry point inside the service
    pub entry: String,
    /// Container CLI binary
    pub command: String,
    /// Compose file for long-running infrastructure, relative to the repository root
    pub infra_compose: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            compose_file: "infra/tools.compose.yaml".to_string(),
            service: "tools".to_string(),
            entry: "toolkit".to_string(),
            command: "docker".to_string(),
            infra_compose: "infra/compose.yaml".to_string(),
        }
    }
}

/// Task orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Maximum scopes processed concurrently
    pub jobs: usize,

    /// Optional per-task deadline enforced by the runner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout_secs: Option<u64>,

    /// Pipeline name -> ordered task ids
    pub pipelines: HashMap<String, Vec<String>>,

    /// Profile name -> executor convention
    pub profiles: HashMap<String, ProfileConfig>,

    /// Task id -> definition
    pub task_graph: HashMap<String, TaskDefinition>,
}

impl Default for TasksConfig {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert("default".to_string(), ProfileConfig::new(Executor::Pnpm));
        Self {
            jobs: 4,
            task_timeout_secs: None,
            pipelines: HashMap::new(),
            profiles,
            task_graph: HashMap::new(),
        }
    }
}

/// Tool that wraps task commands for a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Executor {
    /// `pnpm -C <scope> ...`
    Pnpm,
    /// `mvn -pl <scope> -am ...`
    Maven,
    /// Base args followed by the raw task command
    Custom,
}

/// Per-scope execution convention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Wrapping tool
    pub executor: Executor,

    /// Arguments inserted before every task command
    #[serde(default)]
    pub base_args: Vec<String>,
}

impl ProfileConfig {
    /// Create a profile without base args
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            base_args: Vec::new(),
        }
    }

    /// Set base args
    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }
}

/// Definition of a task in the task graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDefinition {
    /// Argument vector appended after the profile wrapper
    pub command: Vec<String>,

    /// Environment overrides passed to the runner
    pub env: HashMap<String, String>,

    /// Input glob patterns (for cache key computation)
    pub inputs: Vec<String>,

    /// Output glob patterns (verified on cache hits)
    pub outputs: Vec<String>,

    /// Whether results may be reused when inputs are unchanged
    pub cacheable: bool,

    /// Tasks in the same scope that must complete first
    pub deps: Vec<String>,
}

impl TaskDefinition {
    /// Create a task running the given argument vector
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add a same-scope dependency
    pub fn with_dep(mut self, dep: impl Into<String>) -> Self {
        self.deps.push(dep.into());
        self
    }

    /// Mark cacheable with the given input and output globs
    pub fn with_cache(mut self, inputs: Vec<String>, outputs: Vec<String>) -> Self {
        self.cacheable = true;
        self.inputs = inputs;
        self.outputs = outputs;
        self
    }

    /// Add an environment override
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Whether caching can take effect for this task
    pub fn is_cacheable(&self) -> bool {
        self.cacheable && !self.inputs.is_empty() && !self.outputs.is_empty()
    }
}

/// Contract task configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Directory holding `<service>/openapi.yaml`
    pub root: String,
    /// Path of the runtime OpenAPI document on a running service
    pub runtime_path: String,
    /// Spectral ruleset, relative to the repository root
    pub spectral_config: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            root: "contracts".to_string(),
            runtime_path: "/q/openapi?format=json".to_string(),
            spectral_config: "config/tools/spectral/.spectral.yaml".to_string(),
        }
    }
}

/// Documentation task configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Documentation site root
    pub root: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            root: "docs".to_string(),
        }
    }
}

/// Per-scope overrides and exclusions applied during discovery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopesConfig {
    /// Scope id -> override
    pub overrides: HashMap<String, ScopeOverride>,
    /// Scope ids never discovered
    pub exclude: Vec<String>,
}

/// Fields a scope override may set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeOverride {
    /// Profile name
    pub profile: Option<String>,
    /// Tags
    pub tags: Option<Vec<String>>,
    /// Fixed port
    pub port: Option<u16>,
    /// Scope dependencies
    pub deps: Option<Vec<String>>,
}
