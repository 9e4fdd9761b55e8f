//! Boundary to the natural-language translator.
//!
//! The engine never generates queries. A [`Translator`] turns a question into
//! query text for a backend kind; [`Translation::to_operation`] wraps that
//! text as an [`Operation`] with an inferred mode.

mod mock;
mod parser;

pub use mock::MockTranslator;
pub use parser::parse_translation;

use async_trait::async_trait;
use serde::Serialize;

use crate::db::BackendKind;
use crate::error::Result;
use crate::query::{DocumentOperation, ExecutionMode, Operation};
use crate::safety::{lexer, StatementType};

/// Confidence reported when the translator gave none.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Complexity estimate reported when the translator gave none.
pub const DEFAULT_COMPLEXITY_SCORE: u32 = 5;

/// Produces query text from a natural-language question.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `question` into SQL (relational) or a JSON envelope (document).
    async fn translate(&self, question: &str, kind: BackendKind) -> Result<Translation>;
}

/// Translator output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    /// SQL text or a JSON document-operation envelope.
    pub query: String,
    pub explanation: String,
    pub confidence: f64,
    pub tables_used: Vec<String>,
    pub complexity_score: u32,
}

impl Translation {
    /// A translation carrying only query text, with default metadata.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            explanation: "Query generated".to_string(),
            confidence: DEFAULT_CONFIDENCE,
            tables_used: Vec::new(),
            complexity_score: DEFAULT_COMPLEXITY_SCORE,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Mode implied by the query text.
    ///
    /// Relational text is mutating only when it leads with a write or DDL
    /// keyword. Anything else stays read-only, so a read carrying a stacked
    /// write is still rejected by the classifier. A document envelope is
    /// read-only when it is a pipeline read; text that does not parse is
    /// treated as read-only so the engine reports the parse error.
    pub fn inferred_mode(&self, kind: BackendKind) -> ExecutionMode {
        let read_only = match kind {
            BackendKind::Relational => {
                match lexer::first_word(&self.query).map(StatementType::from_keyword) {
                    None | Some(StatementType::Unknown) => true,
                    Some(statement) => statement.is_read(),
                }
            }
            BackendKind::Document => DocumentOperation::parse(&self.query)
                .map(|op| op.is_read())
                .unwrap_or(true),
        };
        if read_only {
            ExecutionMode::ReadOnly
        } else {
            ExecutionMode::Mutating
        }
    }

    /// Wraps the query as an operation with the inferred mode.
    ///
    /// Callers decide whether a mutating operation may run; this only
    /// reports what the text would do.
    pub fn to_operation(&self, kind: BackendKind, row_cap: Option<usize>) -> Operation {
        let operation = Operation::new(self.query.clone(), self.inferred_mode(kind));
        match row_cap {
            Some(cap) => operation.with_row_cap(cap),
            None => operation,
        }
    }
}
