//! Integration tests for querygate.

pub mod concurrency_test;
pub mod config_test;
pub mod connection_test;
pub mod document_test;
pub mod engine_sqlite_test;
pub mod query_test;
