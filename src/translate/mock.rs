//! Mock translator for testing.
//!
//! Provides deterministic translations based on input patterns.

use async_trait::async_trait;

use crate::db::BackendKind;
use crate::error::{EngineError, Result};

use super::{parse_translation, Translation, Translator};

/// Returns canned translator output for questions matching a pattern.
#[derive(Debug, Clone, Default)]
pub struct MockTranslator {
    /// Custom response mappings (pattern -> raw translator output).
    responses: Vec<(String, String)>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the question contains `pattern` (case-insensitive), `response`
    /// is parsed as if a model had returned it.
    pub fn with_response(mut self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push((pattern.into(), response.into()));
        self
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, question: &str, kind: BackendKind) -> Result<Translation> {
        let question_lower = question.to_lowercase();
        for (pattern, response) in &self.responses {
            if question_lower.contains(&pattern.to_lowercase()) {
                return Ok(parse_translation(response));
            }
        }

        if question_lower.contains("users") {
            let query = match kind {
                BackendKind::Relational => "SELECT * FROM users".to_string(),
                BackendKind::Document => r#"{"collection": "users", "pipeline": []}"#.to_string(),
            };
            return Ok(Translation::new(query).with_explanation("Lists every user"));
        }

        Err(EngineError::internal(format!(
            "No mock translation for '{}'",
            question
        )))
    }
}
