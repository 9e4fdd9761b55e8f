//! Configuration loading from files and the environment.

use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use querygate::config::Config;
use querygate::db::DatabaseBackend;
use querygate::ErrorKind;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
[engine]
query_timeout_secs = 5
max_complexity = 4
row_cap = 250
enforce_complexity = true

[pool]
max_connections = 8

[connections.default]
url = "sqlite://data.db"

[connections.events]
url = "mongodb://localhost:27017"
database = "analytics"
"#,
    );

    let config = Config::load_from_file(file.path()).unwrap();
    assert_eq!(config.engine.query_timeout, Duration::from_secs(5));
    assert_eq!(config.engine.max_complexity, 4);
    assert_eq!(config.engine.row_cap, 250);
    assert!(config.engine.enforce_complexity);
    assert_eq!(config.pool.max_connections, 8);

    let default = config.get_connection(None).unwrap();
    assert_eq!(default.resolve_backend().unwrap(), DatabaseBackend::Sqlite);

    let events = config.get_connection(Some("events")).unwrap();
    assert_eq!(events.resolve_backend().unwrap(), DatabaseBackend::MongoDb);
    assert_eq!(events.document_database().unwrap(), "analytics");
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from_file(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.engine.row_cap, 1000);
    assert_eq!(config.engine.query_timeout, Duration::from_secs(30));
    assert!(config.connections.is_empty());
}

#[test]
fn test_invalid_limits_are_config_errors() {
    let file = write_config("[engine]\nrow_cap = 0\n");
    let err = Config::load_from_file(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_environment_overrides_file_values() {
    let file = write_config("[engine]\nquery_timeout_secs = 5\nrow_cap = 10\n");
    let mut config = Config::load_from_file(file.path()).unwrap();

    config.apply_overrides_from(|key| match key {
        "QUERY_TIMEOUT_SECONDS" => Some("12".to_string()),
        "QUERY_POOL_SIZE" => Some("3".to_string()),
        "QUERY_ROW_CAP" => Some("not a number".to_string()),
        _ => None,
    });

    assert_eq!(config.engine.query_timeout, Duration::from_secs(12));
    assert_eq!(config.pool.max_connections, 3);
    assert_eq!(config.engine.row_cap, 10);
}
