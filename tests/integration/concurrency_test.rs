//! Concurrency behaviour of the engine over shared backend handles.

use std::time::Duration;

use futures::future::join_all;
use querygate::config::EngineConfig;
use querygate::db::{BackendHandle, MockSqlConnector};
use querygate::{ErrorKind, Operation, QueryExecutor, QueryStatus};
use tokio::time::Instant;

#[tokio::test]
async fn test_slow_backend_does_not_block_other_backends() {
    let slow = MockSqlConnector::new().with_delay(Duration::from_millis(400));
    let fast = MockSqlConnector::new();
    let slow_handle = BackendHandle::relational(slow.clone());
    let fast_handle = BackendHandle::relational(fast.clone());
    let executor = QueryExecutor::new(EngineConfig::default());
    let op = Operation::read_only("SELECT 1");

    let slow_call = executor.execute(&slow_handle, &op);
    let fast_call = async {
        let start = Instant::now();
        let result = executor.execute(&fast_handle, &op).await;
        (result, start.elapsed())
    };

    let (slow_result, (fast_result, fast_elapsed)) = tokio::join!(slow_call, fast_call);
    assert_eq!(slow_result.status, QueryStatus::Success);
    assert_eq!(fast_result.status, QueryStatus::Success);
    assert!(fast_elapsed < Duration::from_millis(200), "{fast_elapsed:?}");
}

#[tokio::test]
async fn test_calls_beyond_pool_width_queue_and_complete() {
    let mock = MockSqlConnector::new()
        .with_pool_width(2)
        .with_delay(Duration::from_millis(30));
    let handle = BackendHandle::relational(mock.clone());
    let executor = QueryExecutor::new(EngineConfig::default());
    let op = Operation::read_only("SELECT * FROM t");

    let results = join_all((0..6).map(|_| executor.execute(&handle, &op))).await;

    assert!(results.iter().all(|r| r.status == QueryStatus::Success));
    assert_eq!(mock.call_count(), 6);
    assert!(mock.peak_in_flight() <= 2, "peak {}", mock.peak_in_flight());
    assert_eq!(mock.in_flight(), 0);
    assert_eq!(mock.available_permits(), 2);
}

#[tokio::test]
async fn test_timed_out_calls_release_their_session() {
    let mock = MockSqlConnector::new()
        .with_pool_width(1)
        .with_delay(Duration::from_millis(300));
    let handle = BackendHandle::relational(mock.clone());
    let op = Operation::read_only("SELECT 1");

    let impatient =
        QueryExecutor::new(EngineConfig::default().with_timeout(Duration::from_millis(40)));
    let result = impatient.execute(&handle, &op).await;
    assert_eq!(result.status, QueryStatus::Timeout);
    assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    assert_eq!(mock.in_flight(), 0);
    assert_eq!(mock.available_permits(), 1);

    let patient = QueryExecutor::new(EngineConfig::default());
    let result = patient.execute(&handle, &op).await;
    assert_eq!(result.status, QueryStatus::Success);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_executor_across_tasks() {
    let mock = MockSqlConnector::new().with_generated_rows(20);
    let handle = BackendHandle::relational(mock.clone());
    let executor = QueryExecutor::new(EngineConfig::default());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let executor = executor.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                let op = Operation::read_only("SELECT id, name FROM t").with_row_cap(i + 1);
                executor.execute(&handle, &op).await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let result = task.await.unwrap();
        assert_eq!(result.status, QueryStatus::Success);
        assert_eq!(result.row_count, (i + 1) as u64);
        assert!(result.truncated);
    }
    assert_eq!(mock.call_count(), 8);
}
