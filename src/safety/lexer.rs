//! Word-level scanning of SQL text.
//!
//! A "word" is a maximal run of ASCII letters, digits and underscores, so
//! `created_at` is one word and never matches `CREATE`. No quoting rules are
//! applied: keyword text inside string literals still counts.

/// Iterates over the words of `sql` in order.
pub fn words(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty())
}

/// Returns true if `keyword` appears as a whole word (case-insensitive).
pub fn contains_word(sql: &str, keyword: &str) -> bool {
    words(sql).any(|w| w.eq_ignore_ascii_case(keyword))
}

/// Counts whole-word occurrences of `keyword` (case-insensitive).
pub fn count_word(sql: &str, keyword: &str) -> usize {
    words(sql)
        .filter(|w| w.eq_ignore_ascii_case(keyword))
        .count()
}

/// Returns true if the two words appear consecutively, e.g. `GROUP BY`.
pub fn contains_phrase(sql: &str, first: &str, second: &str) -> bool {
    let mut prev: Option<&str> = None;
    for word in words(sql) {
        if let Some(p) = prev {
            if p.eq_ignore_ascii_case(first) && word.eq_ignore_ascii_case(second) {
                return true;
            }
        }
        prev = Some(word);
    }
    false
}

/// Returns true if a whole-word `keyword` is followed, after optional
/// whitespace, by `next`, e.g. `SELECT *` or `LIKE '%`.
pub fn keyword_followed_by(sql: &str, keyword: &str, next: &str) -> bool {
    word_spans(sql).any(|(start, word)| {
        word.eq_ignore_ascii_case(keyword)
            && sql[start + word.len()..].trim_start().starts_with(next)
    })
}

/// Words paired with their byte offset in `sql`.
fn word_spans(sql: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let start = pos + sql[pos..].find(is_word_char)?;
        let len = sql[start..]
            .find(|c: char| !is_word_char(c))
            .unwrap_or(sql.len() - start);
        pos = start + len;
        Some((start, &sql[start..pos]))
    })
}

/// Returns true if the trimmed text begins with `keyword` followed by a
/// non-word character or the end of input.
pub fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    let trimmed = sql.trim_start();
    let Some(head) = trimmed.get(..keyword.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(keyword) {
        return false;
    }
    trimmed[keyword.len()..]
        .chars()
        .next()
        .map_or(true, |c| !is_word_char(c))
}

/// Returns the first word of the text, if any.
pub fn first_word(sql: &str) -> Option<&str> {
    words(sql).next()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
