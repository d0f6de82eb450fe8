//! Container runner
//!
//! Every command a pipeline executes goes through a [`ContainerRunner`]. The
//! production implementation wraps the command in `docker compose run` against
//! the repository's tools service.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use monokit_core::config::DockerConfig;
use monokit_core::fs::assert_path_within_root;
use monokit_core::{ConfigError, RunnerError};

/// Exit code reported when a task exceeds its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

const REDACTED: &str = "[REDACTED]";

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Process exit code
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl ExecOutput {
    /// A successful result with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Whether the command exited with code 0
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs argument vectors inside the tools container.
///
/// A non-zero exit is reported through [`ExecOutput::exit_code`]; an `Err` is
/// returned only when the process could not be launched at all.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Run `argv` with `env` overrides
    async fn run(&self, argv: &[String], env: &HashMap<String, String>) -> Result<ExecOutput, RunnerError>;
}

/// Variable names whose values are treated as secrets
static SECRET_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(token|secret|password|api[_-]?key|private|auth)").expect("Invalid regex")
});

/// GitHub and AWS access key shapes
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(ghp_|github_pat_|AKIA|ASIA)[0-9A-Za-z_\-]{8,}").expect("Invalid regex")
});

/// Masks secrets in captured output.
///
/// Values of variables whose name looks like a credential are replaced, as
/// are well-known token shapes (GitHub and AWS access keys).
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    /// Collect secret values from `(name, value)` pairs
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut redactor = Self::default();
        redactor.extend(vars);
        redactor
    }

    /// Add secret values from `(name, value)` pairs
    pub fn extend<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value = value.into();
            if value.len() >= 4 && SECRET_KEY_REGEX.is_match(key.as_ref()) && !self.secrets.contains(&value) {
                self.secrets.push(value);
            }
        }
        // Longest first so a secret containing another is masked whole
        self.secrets.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    /// Number of secret values known to the redactor
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether no secret values are known
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Replace every known secret and token in `text`
    pub fn redact(&self, text: &str) -> String {
        let mut out = TOKEN_REGEX.replace_all(text, REDACTED).into_owned();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        out
    }
}

/// Build the full `docker compose run` invocation for `argv`
pub fn build_compose_args(repo_root: &Path, docker: &DockerConfig, argv: &[String]) -> Vec<String> {
    let compose_file = repo_root.join(&docker.compose_file);
    let mut args = vec![
        "compose".to_string(),
        "-f".to_string(),
        compose_file.to_string_lossy().into_owned(),
        "run".to_string(),
        "--rm".to_string(),
        docker.service.clone(),
        docker.entry.clone(),
    ];
    args.extend(argv.iter().cloned());
    args
}

/// Container CLIs allowed to drive the infrastructure compose file
const INFRA_COMMANDS: [&str; 2] = ["docker", "podman"];

/// Lifecycle action on the infrastructure compose project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraAction {
    /// Start services detached
    Up,
    /// Stop and remove services
    Down,
    /// List services
    Ps,
    /// Print service logs
    Logs,
}

impl InfraAction {
    /// Compose subcommand and flags for this action
    pub fn compose_args(&self) -> &'static [&'static str] {
        match self {
            Self::Up => &["up", "-d"],
            Self::Down => &["down"],
            Self::Ps => &["ps"],
            Self::Logs => &["logs"],
        }
    }
}

/// Build the `compose -f <infra compose file> ...` invocation for `action`.
///
/// The compose file must exist inside the repository and the container CLI
/// must be `docker` or `podman`.
pub fn build_infra_args(repo_root: &Path, docker: &DockerConfig, action: InfraAction) -> Result<Vec<String>, ConfigError> {
    if !INFRA_COMMANDS.contains(&docker.command.as_str()) {
        return Err(ConfigError::InvalidValue {
            field: "docker.command".to_string(),
            message: format!("unsupported infra command '{}'", docker.command),
        });
    }

    let compose_file = repo_root.join(&docker.infra_compose);
    assert_path_within_root(repo_root, &compose_file, "infra compose file")?;
    if !compose_file.is_file() {
        return Err(ConfigError::MissingFile {
            label: "Infra compose file".to_string(),
            path: compose_file,
        });
    }

    let mut args = vec![
        "compose".to_string(),
        "-f".to_string(),
        compose_file.to_string_lossy().into_owned(),
    ];
    args.extend(action.compose_args().iter().map(|a| a.to_string()));
    Ok(args)
}

/// [`ContainerRunner`] that shells out to `docker compose run`
#[derive(Debug, Clone)]
pub struct ComposeRunner {
    repo_root: PathBuf,
    docker: DockerConfig,
    timeout: Option<Duration>,
    redactor: Redactor,
}

impl ComposeRunner {
    /// Create a runner for the repository at `repo_root`
    pub fn new(repo_root: impl Into<PathBuf>, docker: DockerConfig) -> Self {
        Self {
            repo_root: repo_root.into(),
            docker,
            timeout: None,
            redactor: Redactor::default(),
        }
    }

    /// Kill tasks that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mask secrets known to `redactor` in captured output
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    /// Fail early when the container CLI is not installed
    pub fn preflight(&self) -> Result<PathBuf, RunnerError> {
        which::which(&self.docker.command).map_err(|_| RunnerError::Missing(self.docker.command.clone()))
    }
}

impl ComposeRunner {
    async fn exec(
        &self,
        program: &Path,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<ExecOutput, RunnerError> {
        let start = Instant::now();
        let child = Command::new(program)
            .args(args)
            .envs(env)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Launch {
                command: self.docker.command.clone(),
                source,
            })?;

        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), args = ?args, "task timed out");
                    return Ok(ExecOutput {
                        exit_code: TIMEOUT_EXIT_CODE,
                        stdout: String::new(),
                        stderr: format!("Timed out after {}s", limit.as_secs()),
                    });
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|source| RunnerError::Launch {
            command: self.docker.command.clone(),
            source,
        })?;

        let mut redactor = self.redactor.clone();
        redactor.extend(env.iter().map(|(k, v)| (k.as_str(), v.clone())));

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            exit_code,
            duration_ms = start.elapsed().as_millis(),
            "container command finished"
        );

        Ok(ExecOutput {
            exit_code,
            stdout: redactor.redact(&String::from_utf8_lossy(&output.stdout)),
            stderr: redactor.redact(&String::from_utf8_lossy(&output.stderr)),
        })
    }

    /// Run `action` against the infrastructure compose file.
    ///
    /// No timeout applies; a non-zero exit is returned as a value.
    #[instrument(skip(self), fields(command = %self.docker.command))]
    pub async fn infra(&self, action: InfraAction) -> monokit_core::Result<ExecOutput> {
        let args = build_infra_args(&self.repo_root, &self.docker, action)?;
        let program = self.preflight()?;
        debug!(args = ?args, "running infra compose");
        Ok(self.exec(&program, &args, &HashMap::new(), None).await?)
    }
}

#[async_trait]
impl ContainerRunner for ComposeRunner {
    #[instrument(skip_all, fields(command = %self.docker.command))]
    async fn run(&self, argv: &[String], env: &HashMap<String, String>) -> Result<ExecOutput, RunnerError> {
        if argv.is_empty() {
            return Err(RunnerError::EmptyCommand);
        }
        let program = self.preflight()?;
        let args = build_compose_args(&self.repo_root, &self.docker, argv);
        debug!(args = ?args, "running in container");
        self.exec(&program, &args, env, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_compose_args() {
        let docker = DockerConfig::default();
        let args = build_compose_args(
            Path::new("/repo"),
            &docker,
            &["pnpm".to_string(), "-C".to_string(), "front/apps/web".to_string()],
        );
        assert_eq!(
            args,
            vec![
                "compose",
                "-f",
                "/repo/infra/tools.compose.yaml",
                "run",
                "--rm",
                "tools",
                "toolkit",
                "pnpm",
                "-C",
                "front/apps/web",
            ]
        );
    }

    #[test]
    fn test_redacts_secret_env_values() {
        let redactor = Redactor::from_vars([
            ("GITHUB_TOKEN", "s3cr3t-value"),
            ("DB_PASSWORD", "hunter22"),
            ("HOME", "/home/user"),
            ("API_KEY", "abc"),
        ]);
        assert_eq!(redactor.len(), 2);

        let out = redactor.redact("token=s3cr3t-value pw=hunter22 home=/home/user key=abc");
        assert_eq!(out, "token=[REDACTED] pw=[REDACTED] home=/home/user key=abc");
    }

    #[test]
    fn test_redacts_token_shapes() {
        let redactor = Redactor::default();
        let out = redactor.redact("gh ghp_abcdefgh1234 aws AKIAABCDEFGH12 short ghp_abc");
        assert_eq!(out, "gh [REDACTED] aws [REDACTED] short ghp_abc");
    }

    #[test]
    fn test_secret_key_matching_is_case_insensitive() {
        let redactor = Redactor::from_vars([("npm_auth_Token", "abcd1234")]);
        assert_eq!(redactor.redact("abcd1234"), "[REDACTED]");
    }

    #[test]
    fn test_build_infra_args() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("infra")).unwrap();
        std::fs::write(dir.path().join("infra/compose.yaml"), "services: {}").unwrap();

        let args = build_infra_args(dir.path(), &DockerConfig::default(), InfraAction::Up).unwrap();
        let compose = dir.path().join("infra/compose.yaml");
        assert_eq!(args, vec!["compose", "-f", compose.to_str().unwrap(), "up", "-d"]);

        let logs = build_infra_args(dir.path(), &DockerConfig::default(), InfraAction::Logs).unwrap();
        assert_eq!(logs.last().map(String::as_str), Some("logs"));
    }

    #[test]
    fn test_infra_requires_compose_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = build_infra_args(dir.path(), &DockerConfig::default(), InfraAction::Ps).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));

        let outside = DockerConfig {
            infra_compose: "../compose.yaml".to_string(),
            ..Default::default()
        };
        let err = build_infra_args(dir.path(), &outside, InfraAction::Ps).unwrap_err();
        assert!(matches!(err, ConfigError::PathOutsideRoot { .. }));
    }

    #[test]
    fn test_infra_rejects_unknown_container_cli() {
        let docker = DockerConfig {
            command: "nerdctl".to_string(),
            ..Default::default()
        };
        let err = build_infra_args(Path::new("/repo"), &docker, InfraAction::Down).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "docker.command"));
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let runner = ComposeRunner::new("/repo", DockerConfig::default());
        let err = runner.run(&[], &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, RunnerError::EmptyCommand));
    }

    /// Container CLI stand-in that runs `body` and ignores its arguments
    #[cfg(unix)]
    fn fake_cli(dir: &Path, body: &str) -> DockerConfig {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-docker");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        DockerConfig {
            command: script.to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_and_output_are_captured() {
        let dir = tempfile::TempDir::new().unwrap();
        let docker = fake_cli(dir.path(), "echo \"deploy $DEPLOY_TOKEN\"; echo oops >&2; exit 3");
        let runner = ComposeRunner::new(dir.path(), docker);

        let env = HashMap::from([("DEPLOY_TOKEN".to_string(), "abcd1234".to_string())]);
        let output = runner.run(&["build".to_string()], &env).await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "deploy [REDACTED]");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_timeout_exit_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let docker = fake_cli(dir.path(), "sleep 60");
        let runner = ComposeRunner::new(dir.path(), docker).with_timeout(Some(Duration::from_secs(5)));

        let output = runner.run(&["test".to_string()], &HashMap::new()).await.unwrap();
        assert_eq!(output.exit_code, TIMEOUT_EXIT_CODE);
        assert!(!output.is_success());
        assert_eq!(output.stderr, "Timed out after 5s");
    }

    #[tokio::test]
    async fn test_missing_runner_binary() {
        let docker = DockerConfig {
            command: "monokit-no-such-container-cli".to_string(),
            ..Default::default()
        };
        let runner = ComposeRunner::new("/repo", docker);
        let err = runner
            .run(&["echo".to_string()], &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Missing(cmd) if cmd == "monokit-no-such-container-cli"));
    }
}
