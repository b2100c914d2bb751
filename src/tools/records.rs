//! Record tools.
//!
//! Tools: create_record, query_records, delete_record

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::backend::{Collection, Record, RecordQuery};
use crate::convert::{get_optional_object, get_optional_string, get_optional_usize, get_string_arg};
use crate::error::{BackendError, McpError, Result};
use crate::params;
use crate::tools::{ToolContext, ToolDef, ToolHandler, ToolRegistry};

/// Register the record tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolDef::new(
            "create_record",
            "Create a new record in a collection",
            params! {
                required: { "collection": String => "Collection name" },
                optional: { "data": Object => "Record data" }
            },
        ),
        Arc::new(CreateRecord),
    );
    registry.register(
        ToolDef::new(
            "query_records",
            "Query records from a collection",
            params! {
                required: { "collection": String => "Collection name" },
                optional: {
                    "filter": String => "Filter expression",
                    "limit": Number => "Maximum number of records to return"
                }
            },
        ),
        Arc::new(QueryRecords),
    );
    registry.register(
        ToolDef::new(
            "delete_record",
            "Delete a record from a collection",
            params! {
                required: {
                    "collection": String => "Collection name",
                    "id": String => "Record ID"
                }
            },
        ),
        Arc::new(DeleteRecord),
    );
}

/// Resolve a collection, reporting an absent one as not found.
async fn resolve_collection(ctx: &ToolContext, name: &str) -> Result<Collection> {
    ctx.backend
        .find_collection_by_name_or_id(name)
        .await
        .map_err(|e| match e {
            BackendError::NotFound(_) => McpError::CollectionNotFound(name.to_string()),
            other => McpError::backend("find collection", other),
        })
}

struct CreateRecord;

#[async_trait]
impl ToolHandler for CreateRecord {
    async fn call(&self, ctx: &ToolContext, args: &Map<String, JsonValue>) -> Result<String> {
        let name = get_string_arg(args, "collection")?;
        let data = get_optional_object(args, "data")?;

        let collection = resolve_collection(ctx, &name).await?;
        let mut record = Record::new(&collection);
        for (key, value) in data.into_iter().flatten() {
            record.set(key, value.clone());
        }

        let saved = ctx
            .backend
            .save(record)
            .await
            .map_err(|e| McpError::backend("save record", e))?;
        Ok(format!("Record created with ID: {}", saved.id))
    }
}

struct QueryRecords;

#[async_trait]
impl ToolHandler for QueryRecords {
    async fn call(&self, ctx: &ToolContext, args: &Map<String, JsonValue>) -> Result<String> {
        let collection = get_string_arg(args, "collection")?;
        let query = RecordQuery {
            filter: get_optional_string(args, "filter")?.unwrap_or_default(),
            sort: String::new(),
            limit: get_optional_usize(args, "limit")?.unwrap_or(0),
            offset: 0,
        };

        let records = ctx
            .backend
            .find_records_by_filter(&collection, &query)
            .await
            .map_err(|e| McpError::backend("query records", e))?;
        Ok(format!("Found {} records", records.len()))
    }
}

struct DeleteRecord;

#[async_trait]
impl ToolHandler for DeleteRecord {
    async fn call(&self, ctx: &ToolContext, args: &Map<String, JsonValue>) -> Result<String> {
        let name = get_string_arg(args, "collection")?;
        let id = get_string_arg(args, "id")?;

        let collection = resolve_collection(ctx, &name).await?;
        let record = ctx
            .backend
            .find_record_by_id(&collection, &id)
            .await
            .map_err(|e| match e {
                BackendError::NotFound(_) => McpError::RecordNotFound(id.clone()),
                other => McpError::backend("find record", other),
            })?;

        ctx.backend
            .delete(&record)
            .await
            .map_err(|e| McpError::backend("delete record", e))?;
        Ok(format!("Record {} deleted successfully", id))
    }
}
