//! Query execution for querygate.
//!
//! This module holds the unit of work, the result envelope, the document
//! envelope parser, row-limit injection and the orchestrating executor.

pub mod document;
pub mod executor;
pub mod limit;
mod operation;
mod result;

pub use document::DocumentOperation;
pub use executor::QueryExecutor;
pub use limit::ensure_row_limit;
pub use operation::{ExecutionMode, Operation};
pub use result::{ExecutionResult, QueryStatus};
