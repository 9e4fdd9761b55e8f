//! Connection management for querygate.
//!
//! Centralizes backend handle lifecycle.

pub mod manager;

pub use manager::ConnectionRegistry;
