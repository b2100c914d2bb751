//! Collection tools.
//!
//! Tools: create_collection, list_collections

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::backend::DEFAULT_COLLECTION_KIND;
use crate::convert::{get_optional_string, get_string_arg};
use crate::error::{McpError, Result};
use crate::params;
use crate::tools::{ToolContext, ToolDef, ToolHandler, ToolRegistry};

/// Register the collection tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolDef::new(
            "create_collection",
            "Create a new collection in PocketBase",
            params! {
                required: { "name": String => "Collection name" },
                optional: {
                    "type": String => "Collection type (base or view)",
                    "schema": Object => "Collection schema fields"
                }
            },
        ),
        Arc::new(CreateCollection),
    );
    registry.register(
        ToolDef::new(
            "list_collections",
            "List all collections in PocketBase",
            params!(),
        ),
        Arc::new(ListCollections),
    );
}

/// Reports the collection that would be created.
///
/// The supplied schema is accepted but not translated into backend fields,
/// and nothing is written to the store.
struct CreateCollection;

#[async_trait]
impl ToolHandler for CreateCollection {
    async fn call(&self, _ctx: &ToolContext, args: &Map<String, JsonValue>) -> Result<String> {
        let name = get_string_arg(args, "name")?;
        let kind = get_optional_string(args, "type")?
            .unwrap_or_else(|| DEFAULT_COLLECTION_KIND.to_string());

        Ok(format!(
            "Collection '{}' of type '{}' would be created",
            name, kind
        ))
    }
}

struct ListCollections;

#[async_trait]
impl ToolHandler for ListCollections {
    async fn call(&self, ctx: &ToolContext, _args: &Map<String, JsonValue>) -> Result<String> {
        let collections = ctx
            .backend
            .find_all_collections(Some(DEFAULT_COLLECTION_KIND))
            .await
            .map_err(|e| McpError::backend("list collections", e))?;

        let names: Vec<&str> = collections.iter().map(|c| c.name.as_str()).collect();
        Ok(format!("Collections: [{}]", names.join(", ")))
    }
}
