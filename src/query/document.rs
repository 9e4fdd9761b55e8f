//! JSON envelope for document-store operations.
//!
//! ```text
//! {"collection": "c", "pipeline": [stage, ...]}
//! {"collection": "c", "insert": {document}}
//! {"collection": "c", "update": {...}, "filter": {...}}
//! {"collection": "c", "delete": true, "filter": {...}}
//! ```
//!
//! Values may use MongoDB extended JSON (`{"$oid": "..."}`); conversion to
//! BSON happens in the connector.

use serde_json::{Map, Value as JsonValue};

use crate::error::{EngineError, Result};
use crate::safety::lexer;

/// JSON object, as carried by the envelope.
pub type JsonObject = Map<String, JsonValue>;

const ACTION_KEYS: [&str; 4] = ["pipeline", "insert", "update", "delete"];

/// A parsed document-store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOperation {
    Read {
        collection: String,
        pipeline: Vec<JsonObject>,
    },
    Insert {
        collection: String,
        document: JsonObject,
    },
    Update {
        collection: String,
        filter: JsonObject,
        update: JsonObject,
    },
    Delete {
        collection: String,
        filter: JsonObject,
    },
}

impl DocumentOperation {
    /// Parses an envelope. Every malformed shape is a classification error.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if lexer::starts_with_keyword(trimmed, "SELECT") || lexer::starts_with_keyword(trimmed, "WITH") {
            return Err(EngineError::classification(
                "SQL text cannot run against a document store; send a JSON envelope such as \
                 {\"collection\": \"name\", \"pipeline\": [...]}",
            ));
        }

        let parsed: JsonValue = serde_json::from_str(trimmed).map_err(|e| {
            EngineError::classification(format!("Document operation is not valid JSON: {}", e))
        })?;

        let mut envelope = match parsed {
            JsonValue::Object(map) => map,
            JsonValue::Array(_) => {
                return Err(EngineError::classification(
                    "A bare pipeline array has no target collection; wrap it as \
                     {\"collection\": \"name\", \"pipeline\": [...]}",
                ))
            }
            other => {
                return Err(EngineError::classification(format!(
                    "Document operation must be a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let collection = match envelope.remove("collection") {
            Some(JsonValue::String(name)) if !name.trim().is_empty() => name,
            Some(JsonValue::String(_)) => {
                return Err(EngineError::classification("'collection' must not be empty"))
            }
            Some(other) => {
                return Err(EngineError::classification(format!(
                    "'collection' must be a string, got {}",
                    json_type_name(&other)
                )))
            }
            None => {
                return Err(EngineError::classification(
                    "Document operation is missing the 'collection' field",
                ))
            }
        };

        let present: Vec<&str> = ACTION_KEYS
            .iter()
            .copied()
            .filter(|key| envelope.contains_key(*key))
            .collect();

        let action = match present.as_slice() {
            [one] => *one,
            [] => {
                return Err(EngineError::classification(
                    "Document operation needs exactly one of 'pipeline', 'insert', 'update' or 'delete'",
                ))
            }
            many => {
                return Err(EngineError::classification(format!(
                    "Document operation is ambiguous: found {}",
                    many.join(", ")
                )))
            }
        };

        match action {
            "pipeline" => {
                let stages = match envelope.remove("pipeline") {
                    Some(JsonValue::Array(stages)) => stages,
                    other => return Err(wrong_type("pipeline", "an array", other.as_ref())),
                };
                let pipeline = stages
                    .into_iter()
                    .enumerate()
                    .map(|(i, stage)| match stage {
                        JsonValue::Object(map) => Ok(map),
                        other => Err(EngineError::classification(format!(
                            "Pipeline stage {} must be an object, got {}",
                            i,
                            json_type_name(&other)
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Read {
                    collection,
                    pipeline,
                })
            }
            "insert" => {
                let document = take_object(&mut envelope, "insert")?;
                Ok(Self::Insert {
                    collection,
                    document,
                })
            }
            "update" => {
                let update = take_object(&mut envelope, "update")?;
                let filter = take_filter(&mut envelope, "update")?;
                Ok(Self::Update {
                    collection,
                    filter,
                    update,
                })
            }
            _ => {
                match envelope.remove("delete") {
                    Some(JsonValue::Bool(true)) => {}
                    other => return Err(wrong_type("delete", "true", other.as_ref())),
                }
                let filter = take_filter(&mut envelope, "delete")?;
                Ok(Self::Delete { collection, filter })
            }
        }
    }

    /// Target collection.
    pub fn collection(&self) -> &str {
        match self {
            Self::Read { collection, .. }
            | Self::Insert { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }

    /// Returns true for pipeline reads.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Read { .. })
    }

    /// Short name of the action, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Returns true for the canonical reachability probe, `SELECT 1`.
pub fn is_health_probe(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("SELECT 1")
}

fn take_object(envelope: &mut JsonObject, key: &str) -> Result<JsonObject> {
    match envelope.remove(key) {
        Some(JsonValue::Object(map)) => Ok(map),
        other => Err(wrong_type(key, "an object", other.as_ref())),
    }
}

fn take_filter(envelope: &mut JsonObject, action: &str) -> Result<JsonObject> {
    match envelope.remove("filter") {
        Some(JsonValue::Object(map)) => Ok(map),
        None => Err(EngineError::classification(format!(
            "'{}' requires a 'filter' object",
            action
        ))),
        other => Err(wrong_type("filter", "an object", other.as_ref())),
    }
}

fn wrong_type(key: &str, expected: &str, found: Option<&JsonValue>) -> EngineError {
    let found = found.map_or("nothing", json_type_name);
    EngineError::classification(format!("'{}' must be {}, got {}", key, expected, found))
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
