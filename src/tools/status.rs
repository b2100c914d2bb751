//! Status tools.
//!
//! Tools: server_status, get_pocketbase_info

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};
use crate::params;
use crate::tools::{ToolContext, ToolDef, ToolHandler, ToolRegistry};

/// Register the status tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolDef::new(
            "server_status",
            "Get PocketBase server status",
            params!(),
        ),
        Arc::new(ServerStatus),
    );
    registry.register(
        ToolDef::new(
            "get_pocketbase_info",
            "Get PocketBase server information",
            params!(),
        ),
        Arc::new(PocketBaseInfo),
    );
}

/// Health probe. An unreachable backend is reported in the text, not as a
/// failed call.
struct ServerStatus;

#[async_trait]
impl ToolHandler for ServerStatus {
    async fn call(&self, ctx: &ToolContext, _args: &Map<String, JsonValue>) -> Result<String> {
        Ok(match ctx.backend.find_all_collections(None).await {
            Ok(collections) => format!(
                "PocketBase server is running and healthy. Found {} collections",
                collections.len()
            ),
            Err(err) => format!("PocketBase server is not responding: {}", err),
        })
    }
}

struct PocketBaseInfo;

#[async_trait]
impl ToolHandler for PocketBaseInfo {
    async fn call(&self, ctx: &ToolContext, _args: &Map<String, JsonValue>) -> Result<String> {
        let collections = ctx
            .backend
            .find_all_collections(None)
            .await
            .map_err(|e| McpError::backend("list collections", e))?;

        Ok(format!(
            "Admin UI: {url}/_/, API: {url}/api/, Status: running, Collections: {count}",
            url = ctx.backend_url,
            count = collections.len()
        ))
    }
}
