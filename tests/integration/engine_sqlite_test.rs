//! End-to-end engine tests against a temporary SQLite database.

use pretty_assertions::assert_eq;
use querygate::config::{ConnectionConfig, EngineConfig, PoolConfig};
use querygate::db::{self, BackendHandle, Value};
use querygate::{ErrorKind, Operation, QueryExecutor, QueryStatus};
use tempfile::TempDir;

async fn temp_handle() -> (TempDir, BackendHandle) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("engine.db").display());
    let config = ConnectionConfig::from_connection_string(&url).unwrap();
    let handle = db::connect(&config, &PoolConfig::default()).await.unwrap();
    (dir, handle)
}

async fn seed(executor: &QueryExecutor, handle: &BackendHandle) {
    let create = executor
        .execute(
            handle,
            &Operation::mutating(
                "CREATE TABLE events (id INTEGER PRIMARY KEY, name TEXT, created_at TEXT)",
            ),
        )
        .await;
    assert_eq!(create.status, QueryStatus::Success, "{:?}", create.error_message);

    let insert = executor
        .execute(
            handle,
            &Operation::mutating(
                "INSERT INTO events (id, name, created_at) VALUES \
                 (1, 'signup', '2024-01-01'), (2, 'login', '2024-01-02'), (3, 'logout', '2024-01-03')",
            ),
        )
        .await;
    assert_eq!(insert.status, QueryStatus::Success, "{:?}", insert.error_message);
    assert_eq!(insert.row_count, 3);
}

#[tokio::test]
async fn test_committed_mutation_is_visible() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig::default());
    seed(&executor, &handle).await;

    let result = executor
        .execute(&handle, &Operation::read_only("SELECT id, name FROM events ORDER BY id"))
        .await;
    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(result.row_count, 3);
    assert!(!result.truncated);
    assert_eq!(result.rows[0].get("name"), Some(&Value::String("signup".to_string())));

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_column_names_containing_keywords_are_allowed() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig::default());
    seed(&executor, &handle).await;

    let result = executor
        .execute(
            &handle,
            &Operation::read_only("SELECT created_at FROM events WHERE id = 2"),
        )
        .await;
    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(
        result.rows[0].get("created_at"),
        Some(&Value::String("2024-01-02".to_string()))
    );

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_mutation_leaves_no_partial_effect() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig::default());
    seed(&executor, &handle).await;

    // Row 10 is inserted before the duplicate key on row 1 fails the statement.
    let failed = executor
        .execute(
            &handle,
            &Operation::mutating("INSERT INTO events (id, name) VALUES (10, 'new'), (1, 'dup')"),
        )
        .await;
    assert_eq!(failed.status, QueryStatus::Error);
    assert_eq!(failed.error_kind, Some(ErrorKind::Execution));
    assert!(failed.rows.is_empty());

    let count = executor
        .execute(&handle, &Operation::read_only("SELECT COUNT(*) AS n FROM events"))
        .await;
    assert_eq!(count.rows[0].get("n"), Some(&Value::Int(3)));

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_read_only_rejects_writes_without_touching_data() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig::default());
    seed(&executor, &handle).await;

    for sql in [
        "DELETE FROM events",
        "DROP TABLE events",
        "SELECT * FROM events; DELETE FROM events",
    ] {
        let result = executor.execute(&handle, &Operation::read_only(sql)).await;
        assert_eq!(result.status, QueryStatus::Error, "{sql}");
        assert_eq!(result.error_kind, Some(ErrorKind::Classification), "{sql}");
    }

    let count = executor
        .execute(&handle, &Operation::read_only("SELECT COUNT(*) AS n FROM events"))
        .await;
    assert_eq!(count.rows[0].get("n"), Some(&Value::Int(3)));

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_row_cap_truncates_large_results() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig::default());

    let sql = "WITH RECURSIVE cnt(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM cnt WHERE x < 100) \
               SELECT x FROM cnt LIMIT 50";
    let result = executor
        .execute(&handle, &Operation::read_only(sql).with_row_cap(5))
        .await;
    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(result.row_count, 5);
    assert_eq!(result.rows.len(), 5);
    assert!(result.truncated);
    assert!(result.truncation_warning().is_some());

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_mutating_cte_delete_reports_affected_rows() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig::default());
    seed(&executor, &handle).await;

    let result = executor
        .execute(
            &handle,
            &Operation::mutating(
                "WITH old AS (SELECT id FROM events WHERE id < 3) \
                 DELETE FROM events WHERE id IN (SELECT id FROM old)",
            ),
        )
        .await;
    assert_eq!(result.status, QueryStatus::Success, "{:?}", result.error_message);
    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows[0].get("rows_affected"), Some(&Value::Int(2)));

    let count = executor
        .execute(&handle, &Operation::read_only("SELECT COUNT(*) AS n FROM events"))
        .await;
    assert_eq!(count.rows[0].get("n"), Some(&Value::Int(1)));

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_mutating_select_is_capped_without_rewriting() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig::default());
    seed(&executor, &handle).await;

    let result = executor
        .execute(
            &handle,
            &Operation::mutating("SELECT id FROM events ORDER BY id;").with_row_cap(2),
        )
        .await;
    assert_eq!(result.status, QueryStatus::Success, "{:?}", result.error_message);
    assert_eq!(result.row_count, 2);
    assert!(result.truncated);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_injected_limit_applies_configured_cap() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig {
        row_cap: 2,
        ..EngineConfig::default()
    });
    seed(&executor, &handle).await;

    let result = executor
        .execute(&handle, &Operation::read_only("SELECT * FROM events;"))
        .await;
    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(result.row_count, 2);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_table_is_execution_error() {
    let (_dir, handle) = temp_handle().await;
    let executor = QueryExecutor::new(EngineConfig::default());

    let result = executor
        .execute(&handle, &Operation::read_only("SELECT * FROM nowhere"))
        .await;
    assert_eq!(result.status, QueryStatus::Error);
    assert_eq!(result.error_kind, Some(ErrorKind::Execution));
    assert!(result
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("no such table"));

    handle.close().await.unwrap();
}
