//! Configuration loading against real files on disk.

use std::io::Write as _;

use overseer::domain::errors::ConfigError;
use overseer::domain::models::{ProbeTarget, UnhealthyAction};
use overseer::infrastructure::config::ConfigLoader;
use overseer::services::SpecRegistry;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create temp config");
    file.write_all(yaml.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_config_loads_with_defaults_filled_in() {
    let file = write_config(
        r#"
start_grace_ms: 250
logging:
  level: debug
processes:
  - name: db
    command: /usr/bin/postgres
    args: ["-D", "/var/lib/pg"]
    env:
      PGPORT: "5432"
  - name: api
    command: /usr/bin/api-server
    depends_on: [db]
    stop_grace_ms: 3000
    restart:
      max_restarts: 5
      base_delay_ms: 500
    health:
      probe:
        type: http
        url: http://127.0.0.1:8080/healthz
      interval_ms: 2000
      on_unhealthy: restart
"#,
    );

    let config = ConfigLoader::load_from_file(file.path()).expect("config loads");
    assert_eq!(config.start_grace_ms, 250);
    assert_eq!(config.logging.level, "debug");
    // Untouched fields keep their defaults.
    assert_eq!(config.logging.format, "pretty");
    assert_eq!(config.event_log_capacity, 256);

    assert_eq!(config.processes.len(), 2);
    let db = &config.processes[0];
    assert_eq!(db.args, vec!["-D", "/var/lib/pg"]);
    assert_eq!(db.env.get("PGPORT").map(String::as_str), Some("5432"));
    assert!(db.autorestart);
    assert_eq!(db.restart.max_restarts, 10);
    assert_eq!(db.stop_grace_ms, 10_000);

    let api = &config.processes[1];
    assert_eq!(api.depends_on, vec!["db"]);
    assert_eq!(api.stop_grace_ms, 3000);
    assert_eq!(api.restart.max_restarts, 5);
    assert_eq!(api.restart.base_delay_ms, 500);
    // Partial restart blocks keep defaults for the rest.
    assert!((api.restart.multiplier - 2.0).abs() < f64::EPSILON);

    let health = api.health.as_ref().expect("health block parsed");
    assert!(
        matches!(health.probe, ProbeTarget::Http { ref url } if url.ends_with("/healthz"))
    );
    assert_eq!(health.interval_ms, 2000);
    assert_eq!(health.on_unhealthy, UnhealthyAction::Restart);
    assert_eq!(health.failure_threshold, 3);
}

#[test]
fn loaded_processes_pass_registry_validation() {
    let file = write_config(
        r#"
processes:
  - name: db
    command: /usr/bin/postgres
  - name: api
    command: /usr/bin/api-server
    depends_on: [db]
"#,
    );

    let config = ConfigLoader::load_from_file(file.path()).expect("config loads");
    let registry = SpecRegistry::load(config.processes).expect("graph is valid");
    assert_eq!(registry.len(), 2);
}

#[test]
fn cyclic_dependencies_fail_registry_validation() {
    let file = write_config(
        r#"
processes:
  - name: a
    command: /bin/true
    depends_on: [b]
  - name: b
    command: /bin/true
    depends_on: [a]
"#,
    );

    let config = ConfigLoader::load_from_file(file.path()).expect("config loads");
    let err = SpecRegistry::load(config.processes).expect_err("cycle rejected");
    assert!(matches!(err, ConfigError::DependencyCycle(_)));
}

#[test]
fn invalid_log_level_is_rejected_at_load() {
    let file = write_config(
        r#"
logging:
  level: loud
processes:
  - name: a
    command: /bin/true
"#,
    );

    assert!(ConfigLoader::load_from_file(file.path()).is_err());
}

#[test]
fn missing_file_yields_defaults_only() {
    // Figment treats an absent YAML file as an empty layer; the result is
    // the programmatic defaults, which hold no processes.
    let config =
        ConfigLoader::load_from_file("/nonexistent/overseer.yaml").expect("defaults apply");
    assert!(config.processes.is_empty());
    assert_eq!(config.start_grace_ms, 500);
}
