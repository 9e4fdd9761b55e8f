//! Command-line argument parsing for querygate.

use clap::Parser;
use querygate::config::{ConnectionConfig, EngineConfig};
use querygate::error::{EngineError, Result};
use querygate::logging;
use std::path::PathBuf;
use std::time::Duration;

/// Validates and runs a single query against a Postgres, SQLite or MongoDB backend.
#[derive(Parser, Debug)]
#[command(name = "querygate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Connection string (postgres://..., sqlite:..., mongodb://...)
    #[arg(value_name = "CONNECTION_STRING")]
    pub connection_string: Option<String>,

    /// SQL text, or a JSON document operation for MongoDB
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run in mutating mode (skips the read-only classifier)
    #[arg(long)]
    pub mutate: bool,

    /// Maximum number of rows to return
    #[arg(long, value_name = "N")]
    pub row_cap: Option<usize>,

    /// Per-query timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Database to use on a document store
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Print the complexity report for the query without running it
    #[arg(long)]
    pub assess: bool,

    /// Only check that the backend is reachable
    #[arg(long)]
    pub test_connection: bool,

    /// Write logs to a file instead of stderr (default location if no path is given)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub log_file: Option<Option<PathBuf>>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// With `--connection NAME` or `--assess` the single positional is the
    /// query, not a connection string.
    fn positionals(&self) -> (Option<&str>, Option<&str>) {
        let first = self.connection_string.as_deref();
        let second = self.query.as_deref();
        if (self.connection.is_some() || self.assess) && second.is_none() {
            (None, first)
        } else {
            (first, second)
        }
    }

    /// Returns the query text, if one was given.
    pub fn query_text(&self) -> Option<&str> {
        self.positionals().1
    }

    /// Converts CLI arguments to a ConnectionConfig.
    ///
    /// This creates a config from CLI args only, without merging with file config.
    pub fn to_connection_config(&self) -> Result<Option<ConnectionConfig>> {
        let Some(conn_str) = self.positionals().0 else {
            return Ok(None);
        };
        if self.connection.is_some() {
            return Err(EngineError::config(
                "Pass either a connection string or --connection, not both",
            ));
        }
        Ok(Some(ConnectionConfig::from_connection_string(conn_str)?))
    }

    /// Applies `--database` to a resolved connection.
    pub fn apply_connection_overrides(&self, connection: ConnectionConfig) -> ConnectionConfig {
        match &self.database {
            Some(db) => connection.with_database(db.clone()),
            None => connection,
        }
    }

    /// Applies `--timeout` and `--row-cap` to the engine limits.
    pub fn apply_engine_overrides(&self, engine: EngineConfig) -> EngineConfig {
        let mut engine = match self.timeout {
            Some(secs) => engine.with_timeout(Duration::from_secs(secs)),
            None => engine,
        };
        if let Some(cap) = self.row_cap {
            engine.row_cap = cap;
        }
        engine
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(querygate::config::Config::default_path)
    }

    /// Returns the named connection to use, if specified.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Log file requested with `--log-file`, if any.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_ref()
            .map(|path| path.clone().unwrap_or_else(logging::default_log_path))
    }
}
