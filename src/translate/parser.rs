//! Parsing of raw translator output.
//!
//! Translators are asked for a JSON object with `sql`, `explanation`,
//! `confidence`, `tables_used` and `complexity_score`. Models often wrap it in
//! prose or a code fence, so the outermost `{...}` span is tried first, then
//! the first fenced block, then the whole text.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{Translation, DEFAULT_COMPLEXITY_SCORE, DEFAULT_CONFIDENCE};

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(alias = "query")]
    sql: JsonValue,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    tables_used: Vec<String>,
    #[serde(default)]
    complexity_score: Option<u32>,
}

/// Parses translator output into a [`Translation`]. Never fails.
pub fn parse_translation(content: &str) -> Translation {
    if let Some(translation) = outer_json_object(content).and_then(parse_payload) {
        return translation;
    }

    match extract_fenced_block(content) {
        Some(block) => Translation::new(block.trim()),
        None => Translation::new(content.trim()),
    }
}

fn outer_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn parse_payload(json: &str) -> Option<Translation> {
    let payload: Payload = serde_json::from_str(json).ok()?;
    let query = match payload.sql {
        JsonValue::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        JsonValue::Object(map) => JsonValue::Object(map).to_string(),
        _ => return None,
    };

    let mut translation = Translation::new(query);
    if let Some(explanation) = payload.explanation {
        translation.explanation = explanation;
    }
    translation.confidence = payload.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    translation.tables_used = payload.tables_used;
    translation.complexity_score = payload
        .complexity_score
        .unwrap_or(DEFAULT_COMPLEXITY_SCORE);
    Some(translation)
}

/// Content of the first ``` fenced block, whatever its language tag.
fn extract_fenced_block(text: &str) -> Option<&str> {
    let fence = text.find("```")?;
    let after_fence = &text[fence + 3..];
    let content_start = after_fence.find('\n')? + 1;
    let content = &after_fence[content_start..];
    let end = content.find("```")?;
    Some(&content[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_payload() {
        let content = r#"Here you go:
{
    "sql": "SELECT name FROM users",
    "explanation": "Lists user names",
    "confidence": 0.95,
    "tables_used": ["users"],
    "complexity_score": 2
}"#;
        let t = parse_translation(content);
        assert_eq!(
            t,
            Translation {
                query: "SELECT name FROM users".to_string(),
                explanation: "Lists user names".to_string(),
                confidence: 0.95,
                tables_used: vec!["users".to_string()],
                complexity_score: 2,
            }
        );
    }

    #[test]
    fn test_parse_document_operation_object() {
        let content = r#"{"sql": {"collection": "users", "pipeline": []}, "explanation": "All users"}"#;
        let t = parse_translation(content);
        let query: JsonValue = serde_json::from_str(&t.query).unwrap();
        assert_eq!(
            query,
            serde_json::json!({"collection": "users", "pipeline": []})
        );
        assert_eq!(t.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_bare_envelope_falls_back_to_whole_text() {
        let content = r#"{"collection": "users", "pipeline": []}"#;
        let t = parse_translation(content);
        assert_eq!(t.query, content);
        assert_eq!(t.explanation, "Query generated");
        assert_eq!(t.complexity_score, DEFAULT_COMPLEXITY_SCORE);
    }

    #[test]
    fn test_fenced_sql() {
        let content = "Try this:\n```sql\nSELECT * FROM orders;\n```\nIt lists orders.";
        assert_eq!(parse_translation(content).query, "SELECT * FROM orders;");
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parse_translation("  SELECT 1  ").query, "SELECT 1");
    }

    #[test]
    fn test_empty_sql_field_falls_back() {
        let content = r#"{"sql": "", "explanation": "x"}"#;
        assert_eq!(parse_translation(content).query, content);
    }
}
