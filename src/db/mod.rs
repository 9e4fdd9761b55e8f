//! Backend connectors.
//!
//! Relational engines implement [`SqlConnector`]; document stores implement
//! [`DocumentConnector`]. A [`BackendHandle`] wraps either one and is what
//! the engine dispatches on.

mod mock;
mod mongo;
mod postgres;
mod sqlite;
mod types;

pub use mock::{MockDocumentConnector, MockSqlConnector};
pub use mongo::MongoClient;
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{Outcome, Row, Value};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, PoolConfig};
use crate::error::{EngineError, Result};
use crate::query::document::{is_health_probe, DocumentOperation};
use crate::query::ExecutionMode;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    Sqlite,
    MongoDb,
}

impl DatabaseBackend {
    /// Returns the backend as a string for display and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::MongoDb => "mongodb",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "mongodb" | "mongo" => Some(Self::MongoDb),
            _ => None,
        }
    }

    /// Detects the backend from a connection URL's scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url.trim().to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if lower.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else if lower.starts_with("mongodb://") || lower.starts_with("mongodb+srv://") {
            Some(Self::MongoDb)
        } else {
            None
        }
    }

    /// Which family of connector serves this backend.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Postgres | Self::Sqlite => BackendKind::Relational,
            Self::MongoDb => BackendKind::Document,
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query language family of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQL text.
    Relational,
    /// JSON envelopes with aggregation pipelines.
    Document,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relational => write!(f, "relational"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// Behaviour every connector shares.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The backend this connector talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Connection descriptor with credentials masked, for logs.
    fn descriptor(&self) -> String;

    /// Runs a trivial round trip. `Ok(false)` means the backend answered
    /// but not as expected; unreachable backends are a connectivity error.
    async fn test_connection(&self) -> Result<bool>;

    /// Closes the underlying pool.
    async fn close(&self) -> Result<()>;
}

/// A relational backend.
///
/// Read-only statements run directly on the pool. Mutating statements run
/// inside a transaction that is committed on success and rolled back on any
/// failure before the error is returned.
#[async_trait]
pub trait SqlConnector: Connector {
    async fn run(&self, sql: &str, mode: ExecutionMode, row_cap: usize) -> Result<Outcome>;
}

/// A document backend.
#[async_trait]
pub trait DocumentConnector: Connector {
    /// Executes a parsed envelope. Each action is a single backend call.
    async fn run(&self, operation: &DocumentOperation, row_cap: usize) -> Result<Outcome>;

    /// Parses and executes raw envelope text.
    ///
    /// The `SELECT 1` probe is answered locally with a single `{"1": 1}` row.
    async fn execute(&self, text: &str, row_cap: usize) -> Result<Outcome> {
        if is_health_probe(text) {
            debug!("Answering health probe locally");
            return Ok(Outcome::rows(vec![Row::new().with_field("1", 1)]));
        }
        let operation = DocumentOperation::parse(text)?;
        debug!(
            "Dispatching document {} on collection '{}'",
            operation.action(),
            operation.collection()
        );
        self.run(&operation, row_cap).await
    }
}

/// A connected backend, shared by every caller that executes against it.
#[derive(Clone)]
pub enum BackendHandle {
    Relational(Arc<dyn SqlConnector>),
    Document(Arc<dyn DocumentConnector>),
}

impl BackendHandle {
    pub fn relational(connector: impl SqlConnector + 'static) -> Self {
        Self::Relational(Arc::new(connector))
    }

    pub fn document(connector: impl DocumentConnector + 'static) -> Self {
        Self::Document(Arc::new(connector))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Relational(_) => BackendKind::Relational,
            Self::Document(_) => BackendKind::Document,
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        match self {
            Self::Relational(c) => c.backend(),
            Self::Document(c) => c.backend(),
        }
    }

    pub fn descriptor(&self) -> String {
        match self {
            Self::Relational(c) => c.descriptor(),
            Self::Document(c) => c.descriptor(),
        }
    }

    pub async fn test_connection(&self) -> Result<bool> {
        match self {
            Self::Relational(c) => c.test_connection().await,
            Self::Document(c) => c.test_connection().await,
        }
    }

    pub async fn close(&self) -> Result<()> {
        match self {
            Self::Relational(c) => c.close().await,
            Self::Document(c) => c.close().await,
        }
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("kind", &self.kind())
            .field("backend", &self.backend())
            .field("descriptor", &self.descriptor())
            .finish()
    }
}

/// Creates a connector for the given configuration.
///
/// This is the central factory function for backend connections.
pub async fn connect(config: &ConnectionConfig, pool: &PoolConfig) -> Result<BackendHandle> {
    match config.resolve_backend()? {
        DatabaseBackend::Postgres => {
            let client = PostgresClient::connect(config, pool).await?;
            Ok(BackendHandle::relational(client))
        }
        DatabaseBackend::Sqlite => {
            let client = SqliteClient::connect(config, pool).await?;
            Ok(BackendHandle::relational(client))
        }
        DatabaseBackend::MongoDb => {
            let client = MongoClient::connect(config, pool).await?;
            Ok(BackendHandle::document(client))
        }
    }
}

/// Drains up to `row_cap` items from a fallible stream, converting each.
///
/// One extra item is pulled to learn whether the result was cut; it is
/// discarded. The stream is dropped afterwards, so the backend stops sending.
pub(crate) async fn collect_capped<S, T, E, F>(
    mut stream: S,
    row_cap: usize,
    mut convert: F,
) -> std::result::Result<Outcome, E>
where
    S: Stream<Item = std::result::Result<T, E>> + Unpin,
    F: FnMut(T) -> Row,
{
    let mut rows = Vec::new();
    while rows.len() < row_cap {
        match stream.try_next().await? {
            Some(item) => rows.push(convert(item)),
            None => return Ok(Outcome::rows(rows)),
        }
    }

    let truncated = matches!(stream.try_next().await, Ok(Some(_)));
    if truncated {
        warn!("Result exceeded {} rows, truncating", row_cap);
    }
    Ok(Outcome::Rows { rows, truncated })
}

/// Maps a rollback failure into a log line; the original error wins.
pub(crate) fn log_rollback_failure(error: impl fmt::Display) {
    warn!("Transaction rollback failed: {}", error);
}

/// Error for a pool that was closed by its owner.
pub(crate) fn pool_closed() -> EngineError {
    EngineError::connectivity("Connection pool is closed")
}
