//! The unit of work submitted to the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an operation may change data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Classifier-gated; runs outside any transaction.
    #[default]
    ReadOnly,
    /// Not classified; relational statements run inside a transaction.
    Mutating,
}

impl ExecutionMode {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::Mutating => write!(f, "mutating"),
        }
    }
}

/// Query text or a JSON envelope, plus how to run it.
///
/// The row cap is optional; when absent the engine applies its configured
/// default. A cap of zero is raised to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    text: String,
    mode: ExecutionMode,
    row_cap: Option<usize>,
}

impl Operation {
    pub fn new(text: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            text: text.into(),
            mode,
            row_cap: None,
        }
    }

    pub fn read_only(text: impl Into<String>) -> Self {
        Self::new(text, ExecutionMode::ReadOnly)
    }

    pub fn mutating(text: impl Into<String>) -> Self {
        Self::new(text, ExecutionMode::Mutating)
    }

    /// Overrides the engine's default row cap for this operation.
    pub fn with_row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = Some(row_cap.max(1));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn row_cap(&self) -> Option<usize> {
        self.row_cap
    }
}
