//! OpenAPI contract tasks
//!
//! Each service scope owns `<contracts.root>/<service>/openapi.yaml`. Build and
//! comparison tasks normalize specs with `swagger-cli bundle` into
//! `.cache/monokit/cache/oas/<service>/` before handing them to `oasdiff`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use monokit_core::config::CACHE_ROOT;
use monokit_core::error::ConfigError;
use monokit_core::fs::{assert_path_within_root, relative_to};
use monokit_core::{ChangedFilesRequest, MonokitError, ScopeType};
use monokit_git::GitChangedFiles;

use super::{TaskContext, TaskHandler};
use crate::runner::ExecOutput;

/// Files read and written by the contract tasks of one service
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContractPaths {
    design_spec: PathBuf,
    cache_dir: PathBuf,
    report_dir: PathBuf,
    runtime_spec: PathBuf,
    design_norm: PathBuf,
    runtime_norm: PathBuf,
    base_spec: PathBuf,
    base_norm: PathBuf,
    breaking_report: PathBuf,
}

impl ContractPaths {
    fn resolve(repo_root: &Path, contracts_root: &str, service: &str) -> Self {
        let cache_dir = repo_root.join(CACHE_ROOT).join("cache").join("oas").join(service);
        let report_dir = repo_root
            .join(CACHE_ROOT)
            .join("reports")
            .join("openapi")
            .join(service);
        Self {
            design_spec: repo_root.join(contracts_root).join(service).join("openapi.yaml"),
            runtime_spec: cache_dir.join("runtime.json"),
            design_norm: cache_dir.join("design.norm.yaml"),
            runtime_norm: cache_dir.join("runtime.norm.yaml"),
            base_spec: cache_dir.join("base.yaml"),
            base_norm: cache_dir.join("base.norm.yaml"),
            breaking_report: report_dir.join("breaking.json"),
            cache_dir,
            report_dir,
        }
    }
}

/// Runs `contracts:lint`, `contracts:build`, `contracts:drift` and
/// `contracts:breaking` against service scopes
#[derive(Debug, Clone, Default)]
pub struct ContractsHandler {
    ci_base_ref: Option<String>,
}

impl ContractsHandler {
    /// Create a handler; `ci_base_ref` feeds base resolution for `contracts:breaking`
    pub fn new(ci_base_ref: Option<String>) -> Self {
        Self { ci_base_ref }
    }

    async fn prepare(&self, ctx: &TaskContext<'_>) -> monokit_core::Result<ContractPaths> {
        if ctx.scope.scope_type != ScopeType::Service {
            return Err(ConfigError::ScopeMismatch {
                task: ctx.task_id.to_string(),
                scope: ctx.scope.id.clone(),
                message: "contracts tasks must target service scopes".to_string(),
            }
            .into());
        }

        let paths = ContractPaths::resolve(ctx.repo_root, &ctx.config.contracts.root, ctx.scope.short_name());
        assert_path_within_root(ctx.repo_root, &paths.design_spec, "contracts spec")?;
        tokio::fs::create_dir_all(&paths.cache_dir).await?;
        tokio::fs::create_dir_all(&paths.report_dir).await?;

        if !tokio::fs::try_exists(&paths.design_spec).await.unwrap_or(false) {
            return Err(ConfigError::MissingFile {
                label: "Design spec".to_string(),
                path: paths.design_spec,
            }
            .into());
        }
        Ok(paths)
    }

    async fn normalize(&self, ctx: &TaskContext<'_>, input: &Path, output: &Path) -> monokit_core::Result<ExecOutput> {
        assert_path_within_root(ctx.repo_root, input, "contracts spec")?;
        assert_path_within_root(ctx.repo_root, output, "contracts output")?;
        let args = vec![
            "swagger-cli".to_string(),
            "bundle".to_string(),
            path_arg(input),
            "--type".to_string(),
            "yaml".to_string(),
            "--outfile".to_string(),
            path_arg(output),
        ];
        let result = ctx.runner.run(&args, &HashMap::new()).await?;
        if !result.is_success() {
            warn!(input = %input.display(), exit_code = result.exit_code, "OpenAPI normalization failed");
        }
        Ok(result)
    }

    async fn read_base_spec(&self, ctx: &TaskContext<'_>, design_spec: &Path) -> monokit_core::Result<String> {
        let git = &ctx.config.git;
        let request = ChangedFilesRequest {
            since: None,
            base: Some(git.default_branch.clone()),
            ci_base_ref: self.ci_base_ref.clone(),
            default_branch: git.default_branch.clone(),
            allow_fetch_base: git.allow_fetch_base,
            remote: git.remote.clone(),
        };
        let relative = relative_to(ctx.repo_root, design_spec);
        let provider = GitChangedFiles::new(ctx.repo_root);

        let content = tokio::task::spawn_blocking(move || provider.show_at_base(&request, &relative))
            .await
            .map_err(|e| MonokitError::other(format!("git task panicked: {}", e)))??;
        Ok(content)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl TaskHandler for ContractsHandler {
    #[instrument(skip_all, fields(task = ctx.task_id, scope = %ctx.scope.id))]
    async fn run(&self, ctx: &TaskContext<'_>) -> monokit_core::Result<ExecOutput> {
        let paths = self.prepare(ctx).await?;
        let no_env = HashMap::new();

        match ctx.task_id {
            "contracts:lint" => {
                let ruleset = ctx.repo_root.join(&ctx.config.contracts.spectral_config);
                let args = vec![
                    "spectral".to_string(),
                    "lint".to_string(),
                    "-r".to_string(),
                    path_arg(&ruleset),
                    path_arg(&paths.design_spec),
                ];
                Ok(ctx.runner.run(&args, &no_env).await?)
            }
            "contracts:build" => {
                let result = self.normalize(ctx, &paths.design_spec, &paths.design_norm).await?;
                if !result.is_success() {
                    return Ok(result);
                }
                Ok(ExecOutput::success("contracts:build completed"))
            }
            "contracts:drift" => {
                let port = ctx.scope.port.ok_or_else(|| ConfigError::ScopeMismatch {
                    task: ctx.task_id.to_string(),
                    scope: ctx.scope.id.clone(),
                    message: "missing port for contracts drift".to_string(),
                })?;
                let url = format!("http://localhost:{}{}", port, ctx.config.contracts.runtime_path);
                debug!(url = %url, "fetching runtime spec");

                let fetched = ctx
                    .runner
                    .run(&["curl".to_string(), "-s".to_string(), url], &no_env)
                    .await?;
                if !fetched.is_success() {
                    warn!(exit_code = fetched.exit_code, "failed to fetch runtime OpenAPI");
                    return Ok(fetched);
                }
                tokio::fs::write(&paths.runtime_spec, &fetched.stdout).await?;

                for (input, output) in [
                    (&paths.design_spec, &paths.design_norm),
                    (&paths.runtime_spec, &paths.runtime_norm),
                ] {
                    let result = self.normalize(ctx, input, output).await?;
                    if !result.is_success() {
                        return Ok(result);
                    }
                }

                let args = vec![
                    "oasdiff".to_string(),
                    "diff".to_string(),
                    path_arg(&paths.design_norm),
                    path_arg(&paths.runtime_norm),
                ];
                Ok(ctx.runner.run(&args, &no_env).await?)
            }
            "contracts:breaking" => {
                let base = self.read_base_spec(ctx, &paths.design_spec).await?;
                tokio::fs::write(&paths.base_spec, base).await?;
                info!(path = %paths.base_spec.display(), "wrote base spec");

                for (input, output) in [
                    (&paths.design_spec, &paths.design_norm),
                    (&paths.base_spec, &paths.base_norm),
                ] {
                    let result = self.normalize(ctx, input, output).await?;
                    if !result.is_success() {
                        return Ok(result);
                    }
                }

                let args = vec![
                    "oasdiff".to_string(),
                    "diff".to_string(),
                    "-f".to_string(),
                    "json".to_string(),
                    "-o".to_string(),
                    path_arg(&paths.breaking_report),
                    path_arg(&paths.base_norm),
                    path_arg(&paths.design_norm),
                ];
                Ok(ctx.runner.run(&args, &no_env).await?)
            }
            other => Err(ConfigError::UnsupportedTask(other.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use monokit_core::{Config, ScopeRecord};
    use std::fs;
    use tempfile::TempDir;

    const SPEC: &str = "openapi: 3.0.0\ninfo:\n  title: alpha\n  version: 1.0.0\npaths: {}\n";

    fn repo_with_spec() -> TempDir {
        let dir = TempDir::new().unwrap();
        let service = dir.path().join("contracts/alpha");
        fs::create_dir_all(&service).unwrap();
        fs::write(service.join("openapi.yaml"), SPEC).unwrap();
        dir
    }

    fn alpha() -> ScopeRecord {
        ScopeRecord::new("back:service:alpha", ScopeType::Service, "back/services/alpha").with_port(8081)
    }

    async fn run(
        root: &Path,
        config: &Config,
        scope: &ScopeRecord,
        task_id: &str,
        runner: &ScriptedRunner,
    ) -> monokit_core::Result<ExecOutput> {
        let ctx = TaskContext {
            repo_root: root,
            config,
            scope,
            task_id,
            runner,
        };
        ContractsHandler::default().run(&ctx).await
    }

    #[test]
    fn test_contract_paths() {
        let paths = ContractPaths::resolve(Path::new("/repo"), "contracts", "alpha");
        assert_eq!(paths.design_spec, PathBuf::from("/repo/contracts/alpha/openapi.yaml"));
        assert_eq!(paths.runtime_spec, PathBuf::from("/repo/.cache/monokit/cache/oas/alpha/runtime.json"));
        assert_eq!(
            paths.breaking_report,
            PathBuf::from("/repo/.cache/monokit/reports/openapi/alpha/breaking.json")
        );
    }

    #[tokio::test]
    async fn test_lint_runs_spectral() {
        let dir = repo_with_spec();
        let runner = ScriptedRunner::ok();
        let output = run(dir.path(), &Config::default(), &alpha(), "contracts:lint", &runner)
            .await
            .unwrap();

        assert!(output.is_success());
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(&calls[0][..3], &["spectral", "lint", "-r"]);
        assert!(calls[0][3].ends_with("config/tools/spectral/.spectral.yaml"));
        assert!(calls[0][4].ends_with("contracts/alpha/openapi.yaml"));
        assert!(dir.path().join(".cache/monokit/cache/oas/alpha").is_dir());
    }

    #[tokio::test]
    async fn test_build_reports_completion() {
        let dir = repo_with_spec();
        let runner = ScriptedRunner::ok();
        let output = run(dir.path(), &Config::default(), &alpha(), "contracts:build", &runner)
            .await
            .unwrap();

        assert_eq!(output.stdout, "contracts:build completed");
        assert_eq!(runner.calls()[0][0], "swagger-cli");
        assert!(runner.calls()[0][6].ends_with("design.norm.yaml"));
    }

    #[tokio::test]
    async fn test_build_normalization_failure_is_task_failure() {
        let dir = repo_with_spec();
        let runner = ScriptedRunner::failing_on("swagger-cli", 2);
        let output = run(dir.path(), &Config::default(), &alpha(), "contracts:build", &runner)
            .await
            .unwrap();
        assert_eq!(output.exit_code, 2);
    }

    #[tokio::test]
    async fn test_drift_fetches_and_diffs() {
        let dir = repo_with_spec();
        let runner = ScriptedRunner::ok();
        run(dir.path(), &Config::default(), &alpha(), "contracts:drift", &runner)
            .await
            .unwrap();

        let calls = runner.calls();
        let programs: Vec<&str> = calls.iter().map(|c| c[0].as_str()).collect();
        assert_eq!(programs, vec!["curl", "swagger-cli", "swagger-cli", "oasdiff"]);
        assert_eq!(calls[0][2], "http://localhost:8081/q/openapi?format=json");
        let runtime = fs::read_to_string(dir.path().join(".cache/monokit/cache/oas/alpha/runtime.json")).unwrap();
        assert_eq!(runtime, "ok");
    }

    #[tokio::test]
    async fn test_drift_requires_port() {
        let dir = repo_with_spec();
        let scope = ScopeRecord::new("back:service:alpha", ScopeType::Service, "back/services/alpha");
        let runner = ScriptedRunner::ok();
        let err = run(dir.path(), &Config::default(), &scope, "contracts:drift", &runner)
            .await
            .unwrap_err();
        assert!(matches!(err, MonokitError::Config(ConfigError::ScopeMismatch { .. })));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_non_service_scope() {
        let dir = repo_with_spec();
        let scope = ScopeRecord::new("front:app:web", ScopeType::App, "front/apps/web");
        let runner = ScriptedRunner::ok();
        let err = run(dir.path(), &Config::default(), &scope, "contracts:lint", &runner)
            .await
            .unwrap_err();
        assert!(matches!(err, MonokitError::Config(ConfigError::ScopeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_missing_design_spec() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::ok();
        let err = run(dir.path(), &Config::default(), &alpha(), "contracts:lint", &runner)
            .await
            .unwrap_err();
        assert!(matches!(err, MonokitError::Config(ConfigError::MissingFile { .. })));
    }

    #[tokio::test]
    async fn test_unsupported_contracts_task() {
        let dir = repo_with_spec();
        let runner = ScriptedRunner::ok();
        let err = run(dir.path(), &Config::default(), &alpha(), "contracts:publish", &runner)
            .await
            .unwrap_err();
        assert!(matches!(err, MonokitError::Config(ConfigError::UnsupportedTask(_))));
    }

    #[tokio::test]
    async fn test_breaking_compares_against_base() {
        let dir = repo_with_spec();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("contracts/alpha/openapi.yaml")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "add spec", &tree, &[]).unwrap();
        let branch = repo.head().unwrap().shorthand().unwrap().to_string();

        let mut config = Config::default();
        config.git.default_branch = branch;
        let runner = ScriptedRunner::ok();
        run(dir.path(), &config, &alpha(), "contracts:breaking", &runner)
            .await
            .unwrap();

        let base = fs::read_to_string(dir.path().join(".cache/monokit/cache/oas/alpha/base.yaml")).unwrap();
        assert_eq!(base, SPEC);
        let calls = runner.calls();
        let last = calls.last().unwrap();
        assert_eq!(&last[..5], &["oasdiff", "diff", "-f", "json", "-o"]);
        assert!(last[5].ends_with("breaking.json"));
        assert!(last[6].ends_with("base.norm.yaml"));
        assert!(last[7].ends_with("design.norm.yaml"));
    }

    #[tokio::test]
    async fn test_breaking_outside_git_is_hard_error() {
        let dir = repo_with_spec();
        let runner = ScriptedRunner::ok();
        let err = run(dir.path(), &Config::default(), &alpha(), "contracts:breaking", &runner)
            .await
            .unwrap_err();
        assert!(matches!(err, MonokitError::Git(_)));
    }
}
