//! querygate - validates and executes queries against relational and document backends.
//!
//! This library exposes the core modules for testing and reuse.

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod safety;
pub mod translate;

pub use error::{EngineError, ErrorKind, Result};
pub use query::{ExecutionMode, ExecutionResult, Operation, QueryExecutor, QueryStatus};
