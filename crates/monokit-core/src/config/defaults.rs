//! Default configuration values

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "monokit.yaml";

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "monokit.toml";

/// Alternative configuration file name
pub const ALT_CONFIG_FILE: &str = ".monokit.yaml";

/// Directory under the repository root holding caches and reports
pub const CACHE_ROOT: &str = ".cache/monokit";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_YAML,
        DEFAULT_CONFIG_TOML,
        ALT_CONFIG_FILE,
        ".monokit.toml",
    ]
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# monokit configuration

paths:
  back_services: back/services
  back_libs: back/libs
  front_apps: front/apps
  front_packages: front/packages
  contracts: contracts
  docs: docs
  infra: infra

changed:
  tooling_prefixes: ["config/"]
  contracts_prefix: contracts/
  docs_prefix: docs/

git:
  default_branch: main
  allow_fetch_base: false

docker:
  compose_file: infra/tools.compose.yaml
  service: tools
  entry: toolkit
  command: docker
  infra_compose: infra/compose.yaml

tasks:
  jobs: 4
  pipelines:
    check: [lint, typecheck, test]
    build: [build]
  profiles:
    default:
      executor: pnpm
  task_graph:
    lint:
      command: [lint]
    typecheck:
      command: [typecheck]
    test:
      command: [test]
      deps: [build]
    build:
      command: [build]
      cacheable: true
      inputs: ["src/**/*", "package.json"]
      outputs: ["dist/**/*"]
"#;
