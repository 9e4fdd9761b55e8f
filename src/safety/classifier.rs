//! Read-only classification of relational query text.
//!
//! Text is safe when it begins with SELECT or WITH and contains none of the
//! denylisted keywords as a whole word anywhere, including inside a CTE body
//! or after a statement separator.

use super::lexer;
use super::{ClassificationResult, StatementType, Violation};

/// Keywords that disqualify text from read-only execution.
pub const FORBIDDEN_KEYWORDS: [&str; 12] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "REPLACE", "MERGE",
];

/// Stateless classifier for relational query text.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlClassifier;

impl SqlClassifier {
    /// Creates a new classifier.
    pub fn new() -> Self {
        Self
    }

    /// Classifies text for read-only execution. Never fails.
    pub fn classify(&self, sql: &str) -> ClassificationResult {
        let Some(leading) = lexer::first_word(sql) else {
            return ClassificationResult::unsafe_because(StatementType::Unknown, Violation::Empty);
        };
        let statement_type = StatementType::from_keyword(leading);

        if !lexer::starts_with_keyword(sql, "SELECT") && !lexer::starts_with_keyword(sql, "WITH") {
            return ClassificationResult::unsafe_because(
                statement_type,
                Violation::NotARead {
                    leading: leading.to_ascii_uppercase(),
                },
            );
        }

        let forbidden = lexer::words(sql).find(|word| {
            FORBIDDEN_KEYWORDS
                .iter()
                .any(|kw| word.eq_ignore_ascii_case(kw))
        });

        match forbidden {
            Some(word) => ClassificationResult::unsafe_because(
                statement_type,
                Violation::ForbiddenKeyword(StatementType::from_keyword(word)),
            ),
            None => ClassificationResult::safe(statement_type),
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> ClassificationResult {
    SqlClassifier::new().classify(sql)
}
