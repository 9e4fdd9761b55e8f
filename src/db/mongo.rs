//! MongoDB connector.
//!
//! Reads run as aggregations; writes map to single driver calls
//! (`insert_one`, `update_many`, `delete_many`). The driver owns the
//! connection pool, bounded by `max_pool_size`.

use crate::config::{ConnectionConfig, PoolConfig};
use crate::db::{
    collect_capped, Connector, DatabaseBackend, DocumentConnector, Outcome, Row, Value,
};
use crate::error::{EngineError, Result};
use crate::query::document::{DocumentOperation, JsonObject};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::debug;

/// MongoDB connector bound to one database.
#[derive(Debug, Clone)]
pub struct MongoClient {
    client: Client,
    database: Database,
    descriptor: String,
}

impl MongoClient {
    /// Builds a client for the configured database.
    ///
    /// The driver connects lazily; use `test_connection` to verify reachability.
    pub async fn connect(config: &ConnectionConfig, pool: &PoolConfig) -> Result<Self> {
        let database_name = config.document_database()?;

        let mut options = ClientOptions::parse(&config.url)
            .await
            .map_err(|e| EngineError::config(format!("Invalid MongoDB connection string: {}", e)))?;
        options.max_pool_size = Some(pool.max_connections.max(1));
        options.server_selection_timeout = Some(pool.acquire_timeout());
        options.app_name = Some("querygate".to_string());

        let client = Client::with_options(options).map_err(map_mongo_error)?;
        debug!(
            "Prepared MongoDB client for {} (database '{}')",
            config.display_string(),
            database_name
        );

        Ok(Self::from_client(client, &database_name).with_descriptor(config.display_string()))
    }

    /// Wraps an existing driver client.
    pub fn from_client(client: Client, database: &str) -> Self {
        let database_handle = client.database(database);
        Self {
            client,
            database: database_handle,
            descriptor: format!("mongodb://<client>/{}", database),
        }
    }

    fn with_descriptor(mut self, descriptor: String) -> Self {
        self.descriptor = descriptor;
        self
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl Connector for MongoClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MongoDb
    }

    fn descriptor(&self) -> String {
        self.descriptor.clone()
    }

    async fn test_connection(&self) -> Result<bool> {
        let reply = self
            .database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| EngineError::connectivity(e.to_string()))?;
        Ok(reply
            .get("ok")
            .map(|ok| matches!(ok, Bson::Double(v) if *v == 1.0) || matches!(ok, Bson::Int32(1)))
            .unwrap_or(false))
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[async_trait]
impl DocumentConnector for MongoClient {
    async fn run(&self, operation: &DocumentOperation, row_cap: usize) -> Result<Outcome> {
        match operation {
            DocumentOperation::Read {
                collection,
                pipeline,
            } => {
                let stages = pipeline
                    .iter()
                    .map(|stage| to_document(stage, "pipeline"))
                    .collect::<Result<Vec<_>>>()?;
                let cursor = self
                    .collection(collection)
                    .aggregate(stages)
                    .await
                    .map_err(map_mongo_error)?;
                collect_capped(cursor, row_cap, document_to_row)
                    .await
                    .map_err(map_mongo_error)
            }
            DocumentOperation::Insert {
                collection,
                document,
            } => {
                let result = self
                    .collection(collection)
                    .insert_one(to_document(document, "insert")?)
                    .await
                    .map_err(map_mongo_error)?;
                Ok(Outcome::Mutation {
                    affected: 1,
                    summary: Row::new().with_field("inserted_id", bson_id_string(&result.inserted_id)),
                })
            }
            DocumentOperation::Update {
                collection,
                filter,
                update,
            } => {
                let result = self
                    .collection(collection)
                    .update_many(to_document(filter, "filter")?, to_document(update, "update")?)
                    .await
                    .map_err(map_mongo_error)?;
                Ok(Outcome::Mutation {
                    affected: result.matched_count,
                    summary: Row::new()
                        .with_field("matched_count", result.matched_count)
                        .with_field("modified_count", result.modified_count),
                })
            }
            DocumentOperation::Delete { collection, filter } => {
                let result = self
                    .collection(collection)
                    .delete_many(to_document(filter, "filter")?)
                    .await
                    .map_err(map_mongo_error)?;
                Ok(Outcome::Mutation {
                    affected: result.deleted_count,
                    summary: Row::new().with_field("deleted_count", result.deleted_count),
                })
            }
        }
    }
}

/// Converts an envelope object (extended JSON allowed) to BSON.
fn to_document(object: &JsonObject, field: &str) -> Result<Document> {
    match Bson::try_from(serde_json::Value::Object(object.clone())) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(EngineError::classification(format!(
            "'{}' must be a document, got {:?}",
            field,
            other.element_type()
        ))),
        Err(e) => Err(EngineError::classification(format!(
            "Invalid extended JSON in '{}': {}",
            field, e
        ))),
    }
}

fn document_to_row(document: Document) -> Row {
    document
        .into_iter()
        .map(|(key, value)| (key, bson_to_value(value)))
        .collect()
}

fn bson_to_value(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::Int(i as i64),
        Bson::Int64(i) => Value::Int(i),
        Bson::Double(f) => Value::Float(f),
        Bson::String(s) => Value::String(s),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::Int(dt.timestamp_millis()),
        },
        Bson::Binary(binary) => Value::Bytes(binary.bytes),
        other => Value::Json(other.into_relaxed_extjson()),
    }
}

fn bson_id_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.clone().into_relaxed_extjson().to_string(),
    }
}

fn map_mongo_error(error: mongodb::error::Error) -> EngineError {
    use mongodb::error::ErrorKind;

    match *error.kind {
        ErrorKind::ServerSelection { .. } | ErrorKind::DnsResolve { .. } => {
            EngineError::connectivity(error.to_string())
        }
        ErrorKind::Authentication { .. } => EngineError::connectivity(format!(
            "Authentication failed. Check your credentials. ({})",
            error
        )),
        ErrorKind::InvalidArgument { .. } => EngineError::classification(error.to_string()),
        _ => EngineError::execution(error.to_string()),
    }
}
