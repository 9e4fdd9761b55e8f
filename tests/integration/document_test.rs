//! Document-store execution through the engine.
//!
//! Mock-backed tests always run. The live test needs MONGODB_URL, e.g.
//! mongodb://localhost:27017/querygate_test

use std::time::Duration;

use pretty_assertions::assert_eq;
use querygate::config::{ConnectionConfig, EngineConfig, PoolConfig};
use querygate::connection::ConnectionRegistry;
use querygate::db::{BackendHandle, BackendKind, MockDocumentConnector, Row, Value};
use querygate::query::DocumentOperation;
use querygate::translate::{MockTranslator, Translator};
use querygate::{ErrorKind, ExecutionMode, Operation, QueryExecutor, QueryStatus};

fn users(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            Row::new()
                .with_field("_id", format!("id-{i}"))
                .with_field("name", format!("user-{i}"))
        })
        .collect()
}

#[tokio::test]
async fn test_pipeline_read_honours_row_cap() {
    let mock = MockDocumentConnector::new().with_rows(users(10));
    let handle = BackendHandle::document(mock.clone());
    let executor = QueryExecutor::new(EngineConfig::default());

    let op = Operation::read_only(r#"{"collection": "users", "pipeline": [{"$match": {}}]}"#)
        .with_row_cap(4);
    let result = executor.execute(&handle, &op).await;

    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(result.row_count, 4);
    assert!(result.truncated);
    assert_eq!(
        result.rows[0].get("name"),
        Some(&Value::String("user-0".to_string()))
    );
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_sql_text_is_rejected_before_the_store() {
    let mock = MockDocumentConnector::new();
    let handle = BackendHandle::document(mock.clone());
    let executor = QueryExecutor::new(EngineConfig::default());

    let result = executor
        .execute(&handle, &Operation::read_only("SELECT * FROM users"))
        .await;
    assert_eq!(result.status, QueryStatus::Error);
    assert_eq!(result.error_kind, Some(ErrorKind::Classification));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_health_probe_answers_without_the_store() {
    let mock = MockDocumentConnector::new();
    let handle = BackendHandle::document(mock.clone());
    let executor = QueryExecutor::new(EngineConfig::default());

    let result = executor
        .execute(&handle, &Operation::read_only("select 1"))
        .await;
    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(result.row_count, 1);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_writes_report_a_summary_row() {
    let mock = MockDocumentConnector::new();
    let handle = BackendHandle::document(mock.clone());
    let executor = QueryExecutor::new(EngineConfig::default());

    let result = executor
        .execute(
            &handle,
            &Operation::mutating(r#"{"collection": "users", "insert": {"name": "new"}}"#),
        )
        .await;
    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.row_count, 1);

    let ops = mock.operations();
    assert!(matches!(&ops[0], DocumentOperation::Insert { collection, .. } if collection == "users"));
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let mock = MockDocumentConnector::new().with_delay(Duration::from_millis(300));
    let handle = BackendHandle::document(mock);
    let executor =
        QueryExecutor::new(EngineConfig::default().with_timeout(Duration::from_millis(40)));

    let result = executor
        .execute(
            &handle,
            &Operation::read_only(r#"{"collection": "users", "pipeline": []}"#),
        )
        .await;
    assert_eq!(result.status, QueryStatus::Timeout);
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn test_translated_envelope_runs() {
    let translator = MockTranslator::new();
    let translation = translator
        .translate("list users", BackendKind::Document)
        .await
        .unwrap();
    let op = translation.to_operation(BackendKind::Document, Some(2));
    assert_eq!(op.mode(), ExecutionMode::ReadOnly);

    let handle = BackendHandle::document(MockDocumentConnector::new().with_rows(users(3)));
    let result = QueryExecutor::new(EngineConfig::default())
        .execute(&handle, &op)
        .await;
    assert_eq!(result.row_count, 2);
    assert!(result.truncated);
}

#[tokio::test]
async fn test_live_mongodb_round_trip() {
    let Ok(url) = std::env::var("MONGODB_URL") else {
        eprintln!("Skipping test: MONGODB_URL not set");
        return;
    };
    let mut config = ConnectionConfig::from_connection_string(&url).unwrap();
    if config.document_database().is_err() {
        config = config.with_database("querygate_test");
    }

    let registry = ConnectionRegistry::new(PoolConfig::default());
    let handle = registry.provision("mongo", &config).await.unwrap();
    let executor = QueryExecutor::new(EngineConfig::default());
    let collection = format!("querygate_it_{}", std::process::id());

    let insert = executor
        .execute(
            &handle,
            &Operation::mutating(format!(
                r#"{{"collection": "{collection}", "insert": {{"name": "a"}}}}"#
            )),
        )
        .await;
    assert_eq!(insert.status, QueryStatus::Success, "{:?}", insert.error_message);

    let read = executor
        .execute(
            &handle,
            &Operation::read_only(format!(
                r#"{{"collection": "{collection}", "pipeline": [{{"$project": {{"_id": 0, "name": 1}}}}]}}"#
            )),
        )
        .await;
    assert_eq!(read.row_count, 1);
    assert_eq!(read.rows[0].get("name"), Some(&Value::String("a".to_string())));

    let delete = executor
        .execute(
            &handle,
            &Operation::mutating(format!(
                r#"{{"collection": "{collection}", "delete": true, "filter": {{}}}}"#
            )),
        )
        .await;
    assert_eq!(delete.row_count, 1);

    registry.close_all().await;
}
