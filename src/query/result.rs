//! The uniform envelope every execution produces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::db::{Outcome, Row};
use crate::error::{EngineError, ErrorKind};

/// Terminal status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
    Timeout,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Result of one `execute` call.
///
/// `error_message` and `error_kind` are present exactly when `status` is not
/// `Success`. Failed executions carry no rows and a `row_count` of zero. For
/// writes, `rows` holds one summary record and `row_count` is the number of
/// affected (or matched) records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub status: QueryStatus,
    pub rows: Vec<Row>,
    pub row_count: u64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub truncated: bool,
}

impl ExecutionResult {
    /// Builds a success envelope, cutting rows at `row_cap`.
    pub fn from_outcome(outcome: Outcome, row_cap: usize, elapsed: Duration) -> Self {
        let (rows, row_count, truncated) = match outcome {
            Outcome::Rows { mut rows, truncated } => {
                let over = rows.len() > row_cap;
                rows.truncate(row_cap);
                let count = rows.len() as u64;
                (rows, count, truncated || over)
            }
            Outcome::Mutation { affected, summary } => (vec![summary], affected, false),
        };

        Self {
            status: QueryStatus::Success,
            rows,
            row_count,
            elapsed_ms: millis(elapsed),
            error_message: None,
            error_kind: None,
            truncated,
        }
    }

    /// Builds a failure envelope. Timeouts get their own status.
    pub fn from_error(error: &EngineError, elapsed: Duration) -> Self {
        let kind = error.kind();
        let status = match kind {
            ErrorKind::Timeout => QueryStatus::Timeout,
            _ => QueryStatus::Error,
        };

        Self {
            status,
            rows: Vec::new(),
            row_count: 0,
            elapsed_ms: millis(elapsed),
            error_message: Some(error.to_string()),
            error_kind: Some(kind),
            truncated: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Human-readable note when the row cap cut the result.
    pub fn truncation_warning(&self) -> Option<String> {
        self.truncated.then(|| {
            format!(
                "Result truncated to {} rows; refine the query or raise the row cap",
                self.row_count
            )
        })
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
