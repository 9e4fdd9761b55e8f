//! Query execution with safety classification.
//!
//! `QueryExecutor` is the single place that decides the status of an
//! execution. Every call walks the same states:
//!
//! ```text
//! Received -> Classifying (relational, read-only) -> Normalizing -> Dispatched
//!          -> Succeeded | Failed | TimedOut
//! ```
//!
//! and every terminal state is reported through [`ExecutionResult`]; nothing
//! is returned as an `Err` or allowed to unwind out of `execute`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::db::{BackendHandle, DocumentConnector, Outcome, SqlConnector};
use crate::error::{EngineError, ErrorKind, Result};
use crate::safety::{classify_sql, score_complexity, ComplexityReport};

use super::limit::ensure_row_limit;
use super::{ExecutionMode, ExecutionResult, Operation};

/// What the executor hands to a connector once validation passed.
enum Dispatch<'a> {
    Sql {
        connector: &'a Arc<dyn SqlConnector>,
        sql: String,
        mode: ExecutionMode,
    },
    Document {
        connector: &'a Arc<dyn DocumentConnector>,
        text: &'a str,
    },
}

/// Validates, normalizes and runs operations against backend handles.
///
/// Holds no per-call state and can be shared freely between tasks.
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    config: EngineConfig,
}

impl QueryExecutor {
    /// Creates a new query executor.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scores text against the configured complexity threshold.
    pub fn assess(&self, sql: &str) -> ComplexityReport {
        score_complexity(sql, self.config.max_complexity)
    }

    /// Row cap for an operation: its own, else the configured default.
    pub fn effective_row_cap(&self, operation: &Operation) -> usize {
        operation.row_cap().unwrap_or(self.config.row_cap).max(1)
    }

    /// Executes an operation under the configured timeout.
    pub async fn execute(&self, handle: &BackendHandle, operation: &Operation) -> ExecutionResult {
        self.run(handle, operation, self.config.query_timeout, None)
            .await
    }

    /// Executes an operation bounded by the earlier of `deadline` and the
    /// configured timeout. An expired deadline reports `timeout`.
    pub async fn execute_with_deadline(
        &self,
        handle: &BackendHandle,
        operation: &Operation,
        deadline: Instant,
    ) -> ExecutionResult {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let bound = remaining.min(self.config.query_timeout);
        self.run(handle, operation, bound, None).await
    }

    /// Executes an operation that the caller may cancel.
    ///
    /// Cancelling drops the in-flight backend call and reports `error` with
    /// [`ErrorKind::Cancelled`].
    pub async fn execute_cancellable(
        &self,
        handle: &BackendHandle,
        operation: &Operation,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        self.run(handle, operation, self.config.query_timeout, Some(cancel))
            .await
    }

    /// Checks that a backend answers, bounded by the configured timeout.
    pub async fn test_connection(&self, handle: &BackendHandle) -> Result<bool> {
        let timeout = self.config.query_timeout;
        match tokio::time::timeout(timeout, handle.test_connection()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::connectivity(format!(
                "Connection test for {} timed out after {}",
                handle.descriptor(),
                describe(timeout)
            ))),
        }
    }

    async fn run(
        &self,
        handle: &BackendHandle,
        operation: &Operation,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> ExecutionResult {
        let start = Instant::now();
        let row_cap = self.effective_row_cap(operation);
        debug!(
            "Received {} operation for {} backend {}",
            operation.mode(),
            handle.kind(),
            handle.descriptor()
        );

        let outcome = match self.prepare(handle, operation, row_cap) {
            Ok(dispatch) => dispatch_bounded(dispatch, row_cap, timeout, cancel).await,
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed();

        match outcome {
            Ok(outcome) => {
                let result = ExecutionResult::from_outcome(outcome, row_cap, elapsed);
                info!(
                    "Query succeeded: {} rows in {} ms{}",
                    result.row_count,
                    result.elapsed_ms,
                    if result.truncated { " (truncated)" } else { "" }
                );
                result
            }
            Err(error) => {
                match error.kind() {
                    ErrorKind::Classification => info!("Query rejected: {}", error),
                    ErrorKind::Timeout => warn!("Query timed out after {:?}", elapsed),
                    _ => warn!("Query failed: {}", error),
                }
                ExecutionResult::from_error(&error, elapsed)
            }
        }
    }

    /// Classifying and normalizing. Pure; never touches the backend.
    fn prepare<'a>(
        &self,
        handle: &'a BackendHandle,
        operation: &'a Operation,
        row_cap: usize,
    ) -> Result<Dispatch<'a>> {
        let connector = match handle {
            BackendHandle::Document(connector) => {
                return Ok(Dispatch::Document {
                    connector,
                    text: operation.text(),
                })
            }
            BackendHandle::Relational(connector) => connector,
        };

        let text = operation.text();
        if operation.mode().is_read_only() {
            let classification = classify_sql(text);
            if let Some(violation) = classification.violation {
                return Err(EngineError::classification(format!(
                    "Unsafe query rejected: {}",
                    violation
                )));
            }
        }

        if self.config.enforce_complexity {
            let report = self.assess(text);
            if !report.within_limit {
                return Err(EngineError::classification(format!(
                    "Query too complex: {}",
                    report.issues.join("; ")
                )));
            }
        }

        // Mutating text is handed over as written; reads in that mode are
        // still capped by the connector.
        let sql = match operation.mode() {
            ExecutionMode::ReadOnly => ensure_row_limit(text, row_cap),
            ExecutionMode::Mutating => text.to_string(),
        };
        if sql != text {
            debug!("Injected row limit of {}", row_cap);
        }

        Ok(Dispatch::Sql {
            connector,
            sql,
            mode: operation.mode(),
        })
    }
}

/// Runs the connector call under the timeout, optional cancellation and a
/// panic guard.
async fn dispatch_bounded(
    dispatch: Dispatch<'_>,
    row_cap: usize,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<Outcome> {
    let call = async move {
        match dispatch {
            Dispatch::Sql {
                connector,
                sql,
                mode,
            } => connector.run(&sql, mode, row_cap).await,
            Dispatch::Document { connector, text } => connector.execute(text, row_cap).await,
        }
    };

    let guarded = async {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(EngineError::internal(format!(
                "Backend call panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    };

    let bounded = async {
        match tokio::time::timeout(timeout, guarded).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::timeout(format!(
                "Query timed out after {}",
                describe(timeout)
            ))),
        }
    };

    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(EngineError::cancelled("Query cancelled by caller")),
            result = bounded => result,
        },
        None => bounded.await,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn describe(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 && duration.as_secs() > 0 {
        format!("{} seconds", duration.as_secs())
    } else {
        format!("{} ms", duration.as_millis())
    }
}
