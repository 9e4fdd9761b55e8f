//! Lexical safety checks for relational query text.
//!
//! The classifier decides whether text is acceptable for read-only execution.
//! The complexity scorer estimates cost and produces advisory suggestions.
//! Both work on words only; nothing here parses SQL.

mod classifier;
mod complexity;
pub mod lexer;

pub use classifier::{classify_sql, SqlClassifier, FORBIDDEN_KEYWORDS};
pub use complexity::{score_complexity, ComplexityReport, ComplexityScorer};

use std::fmt;

/// A statement keyword the classifier knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    Select,
    With,
    Insert,
    Update,
    Delete,
    Drop,
    Create,
    Alter,
    Truncate,
    Grant,
    Revoke,
    Exec,
    Replace,
    Merge,
    /// Leading word is not a recognised statement keyword.
    Unknown,
}

impl StatementType {
    /// Maps a single word to its statement type (case-insensitive).
    pub fn from_keyword(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "SELECT" => Self::Select,
            "WITH" => Self::With,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "DROP" => Self::Drop,
            "CREATE" => Self::Create,
            "ALTER" => Self::Alter,
            "TRUNCATE" => Self::Truncate,
            "GRANT" => Self::Grant,
            "REVOKE" => Self::Revoke,
            "EXEC" => Self::Exec,
            "REPLACE" => Self::Replace,
            "MERGE" => Self::Merge,
            _ => Self::Unknown,
        }
    }

    /// Returns true for the two statement kinds that may lead a read.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Select | Self::With)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::With => write!(f, "WITH"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Create => write!(f, "CREATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Grant => write!(f, "GRANT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Exec => write!(f, "EXEC"),
            Self::Replace => write!(f, "REPLACE"),
            Self::Merge => write!(f, "MERGE"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Why text was refused for read-only execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Nothing but whitespace.
    Empty,
    /// Text does not begin with SELECT or WITH.
    NotARead { leading: String },
    /// A denylisted keyword appears somewhere in the text.
    ForbiddenKeyword(StatementType),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "query text is empty"),
            Self::NotARead { leading } => write!(
                f,
                "only SELECT or WITH statements are allowed in read-only mode (found '{}')",
                leading
            ),
            Self::ForbiddenKeyword(keyword) => write!(
                f,
                "keyword {} is not allowed in read-only mode",
                keyword
            ),
        }
    }
}

/// Result of classifying query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Statement type of the leading word.
    pub statement_type: StatementType,
    /// First reason the text is unsafe, if any.
    pub violation: Option<Violation>,
}

impl ClassificationResult {
    /// A result for text that passed every check.
    pub fn safe(statement_type: StatementType) -> Self {
        Self {
            statement_type,
            violation: None,
        }
    }

    /// A result for text that failed a check.
    pub fn unsafe_because(statement_type: StatementType, violation: Violation) -> Self {
        Self {
            statement_type,
            violation: Some(violation),
        }
    }

    /// Returns true if the text may run in read-only mode.
    pub fn is_read_only_safe(&self) -> bool {
        self.violation.is_none()
    }
}
