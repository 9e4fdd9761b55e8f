//! Heuristic cost estimation for relational query text.

use serde::Serialize;

use super::lexer;

/// Score plus the advice that goes with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplexityReport {
    pub score: u32,
    pub within_limit: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Scores query text against a fixed threshold.
#[derive(Debug, Clone, Copy)]
pub struct ComplexityScorer {
    max_complexity: u32,
}

impl ComplexityScorer {
    pub fn new(max_complexity: u32) -> Self {
        Self { max_complexity }
    }

    /// Scores the text. Never fails; empty text scores 0.
    ///
    /// JOIN adds 2 each, every SELECT beyond the first adds 3, GROUP BY,
    /// HAVING and DISTINCT add 1 each when present, UNION adds 2 when present.
    pub fn score(&self, sql: &str) -> ComplexityReport {
        let joins = lexer::count_word(sql, "JOIN") as u32;
        let selects = lexer::count_word(sql, "SELECT") as u32;

        let mut score = joins.saturating_mul(2);
        score = score.saturating_add(selects.saturating_sub(1).saturating_mul(3));
        if lexer::contains_phrase(sql, "GROUP", "BY") {
            score = score.saturating_add(1);
        }
        if lexer::contains_word(sql, "HAVING") {
            score = score.saturating_add(1);
        }
        if lexer::contains_word(sql, "DISTINCT") {
            score = score.saturating_add(1);
        }
        if lexer::contains_word(sql, "UNION") {
            score = score.saturating_add(2);
        }

        let within_limit = score <= self.max_complexity;

        let mut issues = Vec::new();
        if !within_limit {
            issues.push(format!(
                "Query complexity ({}) exceeds maximum ({})",
                score, self.max_complexity
            ));
        }
        if !lexer::contains_word(sql, "LIMIT") && !lexer::contains_word(sql, "TOP") {
            issues.push("Consider adding LIMIT clause to prevent large result sets".to_string());
        }

        let mut suggestions = Vec::new();
        if lexer::keyword_followed_by(sql, "SELECT", "*") {
            suggestions.push("Specify exact columns instead of using SELECT *".to_string());
        }
        if joins > 3 {
            suggestions.push("Consider breaking complex joins into smaller queries".to_string());
        }
        if lexer::contains_word(sql, "OR") {
            suggestions.push("Consider using IN clause instead of multiple OR conditions".to_string());
        }
        if lexer::keyword_followed_by(sql, "LIKE", "'%") {
            suggestions.push("Leading wildcards in LIKE patterns prevent index usage".to_string());
        }

        ComplexityReport {
            score,
            within_limit,
            issues,
            suggestions,
        }
    }
}

/// Convenience function to score text without creating a scorer instance.
pub fn score_complexity(sql: &str, max_complexity: u32) -> ComplexityReport {
    ComplexityScorer::new(max_complexity).score(sql)
}
