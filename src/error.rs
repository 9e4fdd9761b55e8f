//! Error types for querygate.
//!
//! Every failure the engine can report falls into one of these classes. The
//! engine converts them into the `ExecutionResult` envelope; nothing in this
//! enum ever escapes `QueryExecutor::execute` as a raised error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for querygate operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Operation text failed the safety or shape check before any backend contact.
    #[error("Classification error: {0}")]
    Classification(String),

    /// The backend rejected or failed the operation (syntax error, constraint
    /// violation, missing table or collection, etc.)
    #[error("Execution error: {0}")]
    Execution(String),

    /// The backend did not answer within the configured bound.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Backend unreachable (host down, auth failed, pool exhausted at connect).
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Invalid configuration or connection descriptor.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled the operation while it was in flight.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serializable tag identifying an [`EngineError`] class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Classification,
    Execution,
    Timeout,
    Connectivity,
    Config,
    Cancelled,
    Internal,
}

impl EngineError {
    /// Creates a classification error with the given reason.
    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a connectivity error with the given message.
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a cancellation error with the given message.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Classification(_) => ErrorKind::Classification,
            Self::Execution(_) => ErrorKind::Execution,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Classification(_) => "Classification Error",
            Self::Execution(_) => "Execution Error",
            Self::Timeout(_) => "Timeout",
            Self::Connectivity(_) => "Connectivity Error",
            Self::Config(_) => "Configuration Error",
            Self::Cancelled(_) => "Cancelled",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true when the error was raised before any backend contact.
    pub fn is_pre_execution(&self) -> bool {
        matches!(self, Self::Classification(_) | Self::Config(_))
    }
}

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
