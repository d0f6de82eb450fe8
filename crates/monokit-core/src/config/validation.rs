//! Configuration validation
//!
//! Structural checks run when a configuration file is loaded. The executor
//! re-checks pipeline, task and profile references at the point of use, since
//! it may be handed a configuration that never went through the loader.

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Task id prefixes handled by dedicated task handlers instead of a command
pub const RESERVED_TASK_PREFIXES: [&str; 2] = ["contracts:", "docs:"];

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_tasks(config)?;
    validate_pipelines(config)?;
    validate_docker(config)?;
    validate_scopes(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_tasks(config: &Config) -> Result<()> {
    if config.tasks.jobs == 0 {
        return Err(ConfigError::InvalidValue {
            field: "tasks.jobs".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into());
    }

    for (id, task) in &config.tasks.task_graph {
        let reserved = RESERVED_TASK_PREFIXES.iter().any(|p| id.starts_with(p));
        if !reserved && task.command.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("tasks.task_graph.{}.command", id),
                message: "command cannot be empty".to_string(),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_pipelines(config: &Config) -> Result<()> {
    let graph = &config.tasks.task_graph;

    let mut names: Vec<&String> = config.tasks.pipelines.keys().collect();
    names.sort();
    for name in names {
        for task in &config.tasks.pipelines[name] {
            if !graph.contains_key(task) {
                return Err(ConfigError::InvalidValue {
                    field: format!("tasks.pipelines.{}", name),
                    message: format!("unknown task '{}'", task),
                }
                .into());
            }
        }
    }

    for (id, task) in graph {
        if let Some(dep) = task.deps.iter().find(|d| !graph.contains_key(*d)) {
            return Err(ConfigError::InvalidValue {
                field: format!("tasks.task_graph.{}.deps", id),
                message: format!("unknown task '{}'", dep),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_docker(config: &Config) -> Result<()> {
    if config.docker.command.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "docker.command".to_string(),
            message: "command cannot be empty".to_string(),
        }
        .into());
    }

    if config.docker.service.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "docker.service".to_string(),
            message: "service cannot be empty".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_scopes(config: &Config) -> Result<()> {
    for (id, override_) in &config.scopes.overrides {
        if let Some(profile) = &override_.profile {
            if !config.tasks.profiles.contains_key(profile) {
                return Err(ConfigError::InvalidValue {
                    field: format!("scopes.overrides.{}.profile", id),
                    message: format!("unknown profile '{}'", profile),
                }
                .into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScopeOverride, TaskDefinition};

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_jobs() {
        let mut config = Config::default();
        config.tasks.jobs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_command() {
        let mut config = Config::default();
        config
            .tasks
            .task_graph
            .insert("lint".to_string(), TaskDefinition::default());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_reserved_tasks_need_no_command() {
        let mut config = Config::default();
        config
            .tasks
            .task_graph
            .insert("contracts:lint".to_string(), TaskDefinition::default());
        config
            .tasks
            .task_graph
            .insert("docs:build".to_string(), TaskDefinition::default());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_pipeline_references_unknown_task() {
        let mut config = Config::default();
        config
            .tasks
            .pipelines
            .insert("ship".to_string(), vec!["deploy".to_string()]);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("deploy"));
    }

    #[test]
    fn test_dependency_references_unknown_task() {
        let mut config = Config::default();
        config.tasks.task_graph.insert(
            "build".to_string(),
            TaskDefinition::new(["run", "build"]).with_dep("compile"),
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_override_profile() {
        let mut config = Config::default();
        config.scopes.overrides.insert(
            "back:service:alpha".to_string(),
            ScopeOverride {
                profile: Some("gradle".to_string()),
                ..Default::default()
            },
        );
        assert!(validate_config(&config).is_err());
    }
}
