//! Mock connectors for testing.
//!
//! Both mocks share their counters across clones, so a test can keep one
//! clone for assertions while the other lives inside a `BackendHandle`.

use super::{pool_closed, Connector, DatabaseBackend, DocumentConnector, Outcome, Row, SqlConnector};
use crate::error::{EngineError, Result};
use crate::query::document::DocumentOperation;
use crate::query::limit::returns_rows;
use crate::query::ExecutionMode;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Counts calls currently inside the mock and the highest count seen.
#[derive(Debug, Default)]
struct Activity {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    closed: AtomicBool,
}

impl Activity {
    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(self)
    }
}

/// Decrements the in-flight count on drop, including when the caller
/// abandons the future on timeout.
struct InFlight<'a>(&'a Activity);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A relational connector that returns scripted results.
#[derive(Debug, Clone)]
pub struct MockSqlConnector {
    backend: DatabaseBackend,
    rows: Vec<Row>,
    affected: u64,
    honour_row_cap: bool,
    delay: Option<Duration>,
    failure: Option<EngineError>,
    reachable: bool,
    pool: Arc<Semaphore>,
    pool_width: usize,
    activity: Arc<Activity>,
    executed: Arc<Mutex<Vec<(String, ExecutionMode)>>>,
}

impl MockSqlConnector {
    /// One row `{"result": "mock"}` for reads, one affected row for writes,
    /// pool width 5.
    pub fn new() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            rows: vec![Row::new().with_field("result", "mock")],
            affected: 1,
            honour_row_cap: true,
            delay: None,
            failure: None,
            reachable: true,
            pool: Arc::new(Semaphore::new(5)),
            pool_width: 5,
            activity: Arc::new(Activity::default()),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Rows returned for reads.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// `count` rows of the form `{"id": i, "name": "row-i"}`.
    pub fn with_generated_rows(self, count: usize) -> Self {
        let rows = (0..count)
            .map(|i| {
                Row::new()
                    .with_field("id", i as i64)
                    .with_field("name", format!("row-{}", i))
            })
            .collect();
        self.with_rows(rows)
    }

    /// Affected-row count reported for writes.
    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    /// Returns every scripted row regardless of the cap passed in.
    pub fn ignoring_row_cap(mut self) -> Self {
        self.honour_row_cap = false;
        self
    }

    /// Sleeps this long (holding a pool permit) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails every call with this error after any delay.
    pub fn failing(mut self, error: EngineError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Makes `test_connection` report a connectivity error.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Maximum simultaneous calls; extra callers wait for a permit.
    pub fn with_pool_width(mut self, width: usize) -> Self {
        let width = width.max(1);
        self.pool = Arc::new(Semaphore::new(width));
        self.pool_width = width;
        self
    }

    pub fn with_backend(mut self, backend: DatabaseBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Number of `run` calls received.
    pub fn call_count(&self) -> usize {
        self.activity.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that held a permit at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.activity.peak.load(Ordering::SeqCst)
    }

    /// Calls currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.activity.in_flight.load(Ordering::SeqCst)
    }

    /// Free pool permits.
    pub fn available_permits(&self) -> usize {
        self.pool.available_permits()
    }

    pub fn pool_width(&self) -> usize {
        self.pool_width
    }

    /// Statements received, in order, with their modes.
    pub fn executed(&self) -> Vec<(String, ExecutionMode)> {
        self.executed
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.activity.closed.load(Ordering::SeqCst)
    }
}

impl Default for MockSqlConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockSqlConnector {
    fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    fn descriptor(&self) -> String {
        format!("mock://{}", self.backend)
    }

    async fn test_connection(&self) -> Result<bool> {
        if self.reachable {
            Ok(true)
        } else {
            Err(EngineError::connectivity("Mock backend is unreachable"))
        }
    }

    async fn close(&self) -> Result<()> {
        self.activity.closed.store(true, Ordering::SeqCst);
        self.pool.close();
        Ok(())
    }
}

#[async_trait]
impl SqlConnector for MockSqlConnector {
    async fn run(&self, sql: &str, mode: ExecutionMode, row_cap: usize) -> Result<Outcome> {
        self.activity.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut executed) = self.executed.lock() {
            executed.push((sql.to_string(), mode));
        }

        let _permit = self.pool.acquire().await.map_err(|_| pool_closed())?;
        let _in_flight = self.activity.enter();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        if !returns_rows(sql) {
            return Ok(Outcome::rows_affected(self.affected));
        }

        if self.honour_row_cap && self.rows.len() > row_cap {
            Ok(Outcome::Rows {
                rows: self.rows[..row_cap].to_vec(),
                truncated: true,
            })
        } else {
            Ok(Outcome::rows(self.rows.clone()))
        }
    }
}

/// A document connector that returns scripted results.
///
/// Uses the default envelope parsing, so malformed text and the health
/// probe behave as they do against a real store.
#[derive(Debug, Clone)]
pub struct MockDocumentConnector {
    rows: Vec<Row>,
    delay: Option<Duration>,
    failure: Option<EngineError>,
    activity: Arc<Activity>,
    operations: Arc<Mutex<Vec<DocumentOperation>>>,
}

impl MockDocumentConnector {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            delay: None,
            failure: None,
            activity: Arc::new(Activity::default()),
            operations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Documents returned for pipeline reads.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, error: EngineError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of parsed operations that reached `run`.
    pub fn call_count(&self) -> usize {
        self.activity.calls.load(Ordering::SeqCst)
    }

    /// Operations received, in order.
    pub fn operations(&self) -> Vec<DocumentOperation> {
        self.operations
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Default for MockDocumentConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockDocumentConnector {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MongoDb
    }

    fn descriptor(&self) -> String {
        "mock://mongodb".to_string()
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        self.activity.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentConnector for MockDocumentConnector {
    async fn run(&self, operation: &DocumentOperation, row_cap: usize) -> Result<Outcome> {
        self.activity.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut operations) = self.operations.lock() {
            operations.push(operation.clone());
        }
        let _in_flight = self.activity.enter();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let outcome = match operation {
            DocumentOperation::Read { .. } => {
                let truncated = self.rows.len() > row_cap;
                Outcome::Rows {
                    rows: self.rows.iter().take(row_cap).cloned().collect(),
                    truncated,
                }
            }
            DocumentOperation::Insert { .. } => Outcome::Mutation {
                affected: 1,
                summary: Row::new().with_field("inserted_id", "mock-id"),
            },
            DocumentOperation::Update { .. } => Outcome::Mutation {
                affected: 1,
                summary: Row::new()
                    .with_field("matched_count", 1)
                    .with_field("modified_count", 1),
            },
            DocumentOperation::Delete { .. } => Outcome::Mutation {
                affected: 1,
                summary: Row::new().with_field("deleted_count", 1),
            },
        };
        Ok(outcome)
    }
}
