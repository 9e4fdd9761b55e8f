//! Row-limit injection for relational reads.

use crate::safety::lexer;

/// Returns true if the text leads with SELECT or WITH.
pub fn is_read_statement(sql: &str) -> bool {
    lexer::starts_with_keyword(sql, "SELECT") || lexer::starts_with_keyword(sql, "WITH")
}

/// Keywords that turn a SELECT/WITH statement into a write, as in a
/// data-modifying CTE (`WITH old AS (...) DELETE FROM t ...`).
const WRITE_KEYWORDS: [&str; 4] = ["INSERT", "UPDATE", "DELETE", "MERGE"];

/// Returns true if the text is a read that yields rows: it leads with SELECT
/// or WITH and contains no whole-word INSERT, UPDATE, DELETE or MERGE.
pub fn returns_rows(sql: &str) -> bool {
    is_read_statement(sql)
        && !WRITE_KEYWORDS
            .iter()
            .any(|keyword| lexer::contains_word(sql, keyword))
}

/// Appends `LIMIT row_cap` to a read that has no LIMIT or TOP clause.
///
/// One trailing `;` is dropped first. Anything that does not return rows, or
/// that already limits itself anywhere in the text, is returned unchanged,
/// which makes the function idempotent.
pub fn ensure_row_limit(sql: &str, row_cap: usize) -> String {
    if !returns_rows(sql)
        || lexer::contains_word(sql, "LIMIT")
        || lexer::contains_word(sql, "TOP")
    {
        return sql.to_string();
    }

    let body = sql.trim();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    format!("{} LIMIT {}", body, row_cap)
}
