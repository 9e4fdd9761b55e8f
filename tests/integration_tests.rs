//! Integration tests for querygate.
//!
//! SQLite and mock-backed tests always run. Postgres and MongoDB tests are
//! skipped unless DATABASE_URL / MONGODB_URL are set.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
