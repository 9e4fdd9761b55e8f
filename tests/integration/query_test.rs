//! Engine tests against a live PostgreSQL database.
//!
//! Set DATABASE_URL to run them.

use pretty_assertions::assert_eq;
use querygate::config::{ConnectionConfig, EngineConfig, PoolConfig};
use querygate::db::{self, BackendHandle, Value};
use querygate::{ErrorKind, Operation, QueryExecutor, QueryStatus};
use std::time::Duration;

async fn get_test_handle() -> Option<BackendHandle> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    db::connect(&config, &PoolConfig::default()).await.ok()
}

#[tokio::test]
async fn test_select_returns_ordered_columns() {
    let Some(handle) = get_test_handle().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = QueryExecutor::new(EngineConfig::default())
        .execute(
            &handle,
            &Operation::read_only("SELECT 1 AS num, 'hello' AS greeting, NULL::text AS nothing"),
        )
        .await;
    assert_eq!(result.status, QueryStatus::Success, "{:?}", result.error_message);
    assert_eq!(result.row_count, 1);

    let row = &result.rows[0];
    assert_eq!(row.columns().collect::<Vec<_>>(), vec!["num", "greeting", "nothing"]);
    assert_eq!(row.get("num"), Some(&Value::Int(1)));
    assert_eq!(row.get("greeting"), Some(&Value::String("hello".to_string())));
    assert_eq!(row.get("nothing"), Some(&Value::Null));

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_generate_series_is_truncated() {
    let Some(handle) = get_test_handle().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = QueryExecutor::new(EngineConfig::default())
        .execute(
            &handle,
            &Operation::read_only("SELECT g FROM generate_series(1, 100) AS g LIMIT 100")
                .with_row_cap(10),
        )
        .await;
    assert_eq!(result.row_count, 10);
    assert!(result.truncated);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_sleep_beyond_timeout() {
    let Some(handle) = get_test_handle().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let executor =
        QueryExecutor::new(EngineConfig::default().with_timeout(Duration::from_millis(200)));
    let result = executor
        .execute(&handle, &Operation::read_only("SELECT pg_sleep(2)"))
        .await;
    assert_eq!(result.status, QueryStatus::Timeout);
    assert_eq!(result.error_kind, Some(ErrorKind::Timeout));

    let after = executor
        .execute(&handle, &Operation::read_only("SELECT 1 AS ok"))
        .await;
    assert_eq!(after.status, QueryStatus::Success);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_syntax_error_carries_server_message() {
    let Some(handle) = get_test_handle().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = QueryExecutor::new(EngineConfig::default())
        .execute(&handle, &Operation::read_only("SELECT FROM WHERE"))
        .await;
    assert_eq!(result.status, QueryStatus::Error);
    assert_eq!(result.error_kind, Some(ErrorKind::Execution));
    assert!(result.error_message.is_some());

    handle.close().await.unwrap();
}
