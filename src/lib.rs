//! # pocketbase-mcp
//!
//! MCP (Model Context Protocol) server for PocketBase.
//!
//! This crate exposes PocketBase administration operations as tools for AI
//! agents. JSON-RPC 2.0 messages are posted to `/mcp/message`, and a
//! server-sent event stream on `/mcp/sse` keeps clients informed that the
//! gateway is alive.
//!
//! ## Tools
//!
//! - `create_collection`, `list_collections`
//! - `create_record`, `query_records`, `delete_record`
//! - `server_status`, `get_pocketbase_info`
//!
//! Every tool call yields a text result or an error result; backend failures
//! never surface as protocol errors.
//!
//! ## Library Usage
//!
//! For testing or embedding, you can use the library API:
//!
//! ```no_run
//! use std::sync::Arc;
//! use pocketbase_mcp::{MemoryBackend, ToolContext, ToolRegistry};
//!
//! # async fn example() {
//! let ctx = ToolContext::new(Arc::new(MemoryBackend::new()), "http://localhost:8090");
//! let registry = ToolRegistry::with_default_tools();
//!
//! let result = registry
//!     .dispatch(&ctx, "list_collections", &serde_json::Map::new())
//!     .await;
//! println!("{}", result.text());
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod config;
mod convert;
pub mod demo;
mod error;
pub mod gateway;
mod server;
pub mod sse;
pub mod tools;

pub use backend::{
    Backend, Collection, CollectionField, MemoryBackend, NewCollection, PocketBaseClient, Record,
    RecordQuery,
};
pub use error::{BackendError, BackendResult, McpError, Result};
pub use server::{JsonRpcRequest, JsonRpcResponse, McpServer};
pub use sse::{SessionManager, SessionStream, StreamEvent};
pub use tools::{ParamKind, ParamSpec, ToolContext, ToolDef, ToolHandler, ToolRegistry, ToolResult};
