//! PostgreSQL connector.
//!
//! Provides the `PostgresClient` struct that implements [`SqlConnector`]
//! for PostgreSQL databases using sqlx.

use crate::config::{ConnectionConfig, PoolConfig};
use crate::db::{
    collect_capped, log_rollback_failure, pool_closed, Connector, DatabaseBackend, Outcome, Row,
    SqlConnector, Value,
};
use crate::error::{EngineError, Result};
use crate::query::limit::returns_rows;
use crate::query::ExecutionMode;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL connector backed by a bounded sqlx pool.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    descriptor: String,
}

impl PostgresClient {
    /// Creates a new PostgresClient from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            descriptor: "postgres://<pool>".to_string(),
        }
    }

    /// Connects with retries on transient failures.
    ///
    /// The pool never holds more than `pool.max_connections` sessions;
    /// callers beyond that wait up to `pool.acquire_timeout_secs`.
    pub async fn connect(config: &ConnectionConfig, pool: &PoolConfig) -> Result<Self> {
        let attempts = pool.connect_retries.max(1);
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, attempts);

            let result = PgPoolOptions::new()
                .max_connections(pool.max_connections.max(1))
                .acquire_timeout(pool.acquire_timeout())
                .connect(&config.url)
                .await;

            match result {
                Ok(pg_pool) => {
                    debug!("Connected to {}", config.display_string());
                    return Ok(Self {
                        pool: pg_pool,
                        descriptor: config.display_string(),
                    });
                }
                Err(e) if attempt < attempts && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(map_connection_error(e, config)),
            }
        }
    }

    async fn run_in_transaction(&self, sql: &str, row_cap: usize) -> Result<Outcome> {
        let mut tx = self.pool.begin().await.map_err(map_query_error)?;

        let result = if returns_rows(sql) {
            collect_capped(
                sqlx::query(sql).persistent(false).fetch(&mut *tx),
                row_cap,
                |row: PgRow| convert_row(&row),
            )
            .await
        } else {
            sqlx::query(sql)
                .persistent(false)
                .execute(&mut *tx)
                .await
                .map(|done| Outcome::rows_affected(done.rows_affected()))
        };

        match result {
            Ok(outcome) => {
                tx.commit().await.map_err(map_query_error)?;
                debug!("Transaction committed");
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    log_rollback_failure(rollback);
                } else {
                    debug!("Transaction rolled back");
                }
                Err(map_query_error(e))
            }
        }
    }
}

#[async_trait]
impl Connector for PostgresClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    fn descriptor(&self) -> String {
        self.descriptor.clone()
    }

    async fn test_connection(&self) -> Result<bool> {
        let value: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EngineError::connectivity(format_query_error(e)))?;
        Ok(value == 1)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl SqlConnector for PostgresClient {
    async fn run(&self, sql: &str, mode: ExecutionMode, row_cap: usize) -> Result<Outcome> {
        match mode {
            ExecutionMode::ReadOnly => collect_capped(
                sqlx::query(sql).persistent(false).fetch(&self.pool),
                row_cap,
                |row: PgRow| convert_row(&row),
            )
            .await
            .map_err(map_query_error),
            ExecutionMode::Mutating => self.run_in_transaction(sql, row_cap).await,
        }
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            (
                col.name().to_string(),
                convert_value(row, i, col.type_info().name()),
            )
        })
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null),

        // For all other types, try to get as string
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) {
        return true;
    }

    let error_str = error.to_string().to_lowercase();

    // Authentication and database-not-found errors are not transient
    if error_str.contains("authentication failed")
        || error_str.contains("does not exist")
        || error_str.contains("ssl")
        || error_str.contains("tls")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to actionable messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> EngineError {
    let url = Url::parse(&config.url).ok();
    let host = url
        .as_ref()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string());
    let port = url.as_ref().and_then(Url::port).unwrap_or(5432);
    let user = url
        .as_ref()
        .map(|u| u.username().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let database = url
        .as_ref()
        .map(|u| u.path().trim_start_matches('/').to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        EngineError::connectivity(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("authentication failed") {
        EngineError::connectivity(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        EngineError::connectivity(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        EngineError::connectivity(
            "Server requires SSL. Add '?sslmode=require' to connection string.",
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        EngineError::connectivity(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        EngineError::connectivity(error.to_string())
    }
}

/// Maps an error raised while running a statement.
fn map_query_error(error: sqlx::Error) -> EngineError {
    match error {
        sqlx::Error::PoolTimedOut => {
            EngineError::timeout("Timed out waiting for a free connection from the pool")
        }
        sqlx::Error::PoolClosed => pool_closed(),
        other => EngineError::execution(format_query_error(other)),
    }
}

/// Formats a query error with hints if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        let extras = [
            ("DETAIL", pg_error.detail()),
            ("HINT", pg_error.hint()),
            ("TABLE", pg_error.table()),
            ("COLUMN", pg_error.column()),
            ("CONSTRAINT", pg_error.constraint()),
        ];
        for (label, value) in extras {
            if let Some(value) = value {
                result.push_str("\n  ");
                result.push_str(label);
                result.push_str(": ");
                result.push_str(value);
            }
        }
    }

    result
}
