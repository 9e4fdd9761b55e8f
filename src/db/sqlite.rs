//! SQLite connector.
//!
//! Mirrors the PostgreSQL connector over an sqlx `SqlitePool`. Values are
//! decoded from each column's runtime storage class since SQLite columns
//! are dynamically typed.

use crate::config::{ConnectionConfig, PoolConfig};
use crate::db::{
    collect_capped, log_rollback_failure, pool_closed, Connector, DatabaseBackend, Outcome, Row,
    SqlConnector, Value,
};
use crate::error::{EngineError, Result};
use crate::query::limit::returns_rows;
use crate::query::ExecutionMode;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo, ValueRef};
use tracing::debug;

/// SQLite connector backed by a bounded sqlx pool.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
    descriptor: String,
}

impl SqliteClient {
    /// Creates a new SqliteClient from an existing connection pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            descriptor: "sqlite://<pool>".to_string(),
        }
    }

    /// Opens the database file named by the URL.
    ///
    /// Add `?mode=rwc` to the URL to create the file if it is missing.
    pub async fn connect(config: &ConnectionConfig, pool: &PoolConfig) -> Result<Self> {
        let sqlite_pool = SqlitePoolOptions::new()
            .max_connections(pool.max_connections.max(1))
            .acquire_timeout(pool.acquire_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| {
                EngineError::connectivity(format!(
                    "Cannot open SQLite database {}: {}",
                    config.display_string(),
                    e
                ))
            })?;

        debug!("Opened {}", config.display_string());
        Ok(Self {
            pool: sqlite_pool,
            descriptor: config.display_string(),
        })
    }

    async fn run_in_transaction(&self, sql: &str, row_cap: usize) -> Result<Outcome> {
        let mut tx = self.pool.begin().await.map_err(map_query_error)?;

        let result = if returns_rows(sql) {
            collect_capped(
                sqlx::query(sql).persistent(false).fetch(&mut *tx),
                row_cap,
                |row: SqliteRow| convert_row(&row),
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
impl Connector for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    fn descriptor(&self) -> String {
        self.descriptor.clone()
    }

    async fn test_connection(&self) -> Result<bool> {
        let value: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EngineError::connectivity(e.to_string()))?;
        Ok(value == 1)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl SqlConnector for SqliteClient {
    async fn run(&self, sql: &str, mode: ExecutionMode, row_cap: usize) -> Result<Outcome> {
        match mode {
            ExecutionMode::ReadOnly => collect_capped(
                sqlx::query(sql).persistent(false).fetch(&self.pool),
                row_cap,
                |row: SqliteRow| convert_row(&row),
            )
            .await
            .map_err(map_query_error),
            ExecutionMode::Mutating => self.run_in_transaction(sql, row_cap).await,
        }
    }
}

fn convert_row(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| (col.name().to_string(), convert_value(row, i)))
        .collect()
}

/// Decodes by the value's own storage class, falling back to the declared type.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "BOOLEAN" => row
            .try_get::<bool, _>(index)
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => row
            .try_get::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" | "FLOAT" | "DOUBLE" => row
            .try_get::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

fn map_query_error(error: sqlx::Error) -> EngineError {
    match error {
        sqlx::Error::PoolTimedOut => {
            EngineError::timeout("Timed out waiting for a free connection from the pool")
        }
        sqlx::Error::PoolClosed => pool_closed(),
        other => match other.as_database_error() {
            Some(db_error) => EngineError::execution(format!("ERROR: {}", db_error.message())),
            None => EngineError::execution(other.to_string()),
        },
    }
}
