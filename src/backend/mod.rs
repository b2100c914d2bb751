//! Backend store facade.
//!
//! The collection/record engine is an external collaborator. This module pins
//! down the narrow command surface the tools consume and ships two
//! implementations of it: [`PocketBaseClient`] talks to a running PocketBase
//! over its REST API, [`MemoryBackend`] keeps everything in process.

mod http;
mod memory;

pub use http::PocketBaseClient;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::BackendResult;

/// Collection type used when the caller does not ask for one.
pub const DEFAULT_COLLECTION_KIND: &str = "base";

/// A collection as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Store-assigned identifier
    pub id: String,
    /// Unique collection name
    pub name: String,
    /// Collection type ("base", "view", "auth")
    #[serde(rename = "type")]
    pub kind: String,
    /// Declared fields
    #[serde(default, alias = "schema")]
    pub fields: Vec<CollectionField>,
}

/// One field of a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionField {
    /// Field name
    pub name: String,
    /// Field type ("text", "bool", "number", ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the field must be set
    #[serde(default)]
    pub required: bool,
}

impl CollectionField {
    /// Create a new field definition.
    pub fn new(name: &str, kind: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            required,
        }
    }
}

/// Parameters for creating a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCollection {
    /// Collection name
    pub name: String,
    /// Collection type
    #[serde(rename = "type")]
    pub kind: String,
    /// Fields to declare
    pub fields: Vec<CollectionField>,
}

/// A record belonging to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record id; empty until the record has been saved
    pub id: String,
    /// Id of the owning collection
    pub collection_id: String,
    /// Name of the owning collection
    pub collection_name: String,
    /// Field values
    pub fields: Map<String, JsonValue>,
}

impl Record {
    /// Create an unsaved, empty record for `collection`.
    pub fn new(collection: &Collection) -> Self {
        Self {
            id: String::new(),
            collection_id: collection.id.clone(),
            collection_name: collection.name.clone(),
            fields: Map::new(),
        }
    }

    /// Set a field value, replacing any previous value.
    pub fn set(&mut self, key: &str, value: JsonValue) {
        self.fields.insert(key.to_string(), value);
    }

    /// Read a field value.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    /// Whether the record has been persisted.
    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }
}

/// A filtered record listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Filter expression; empty matches everything
    pub filter: String,
    /// Sort expression; empty keeps the store's order
    pub sort: String,
    /// Maximum number of records; 0 means no explicit limit
    pub limit: usize,
    /// Number of matching records to skip
    pub offset: usize,
}

/// The command surface of the collection/record store.
///
/// Implementations must be safe to call from many tasks at once; this crate
/// imposes no ordering between concurrent calls.
#[async_trait]
pub trait Backend: Send + Sync {
    /// List collections, optionally restricted to one collection type.
    async fn find_all_collections(&self, kind: Option<&str>) -> BackendResult<Vec<Collection>>;

    /// Resolve a collection by its name or id.
    async fn find_collection_by_name_or_id(&self, name_or_id: &str) -> BackendResult<Collection>;

    /// Create a new collection.
    async fn create_collection(&self, collection: NewCollection) -> BackendResult<Collection>;

    /// List the records of a collection that match `query`.
    async fn find_records_by_filter(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> BackendResult<Vec<Record>>;

    /// Fetch one record by id.
    async fn find_record_by_id(&self, collection: &Collection, id: &str) -> BackendResult<Record>;

    /// Persist a record and return it with its assigned id.
    async fn save(&self, record: Record) -> BackendResult<Record>;

    /// Delete a persisted record.
    async fn delete(&self, record: &Record) -> BackendResult<()>;
}
