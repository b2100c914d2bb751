//! Tool registry and dispatch.
//!
//! Each tool is a [`ToolDef`] (name, description, typed parameter list) paired
//! with a [`ToolHandler`]. Arguments are validated against the parameter list
//! before the handler runs, so handlers only see well-typed input, and every
//! outcome is folded into a [`ToolResult`].

pub mod collections;
pub mod records;
pub mod status;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{McpError, Result};

/// Primitive kind of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// JSON string
    String,
    /// JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// JSON object
    Object,
}

impl ParamKind {
    /// Whether `value` has this kind.
    pub fn matches(self, value: &JsonValue) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
        }
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: &'static str,
    /// Expected kind
    pub kind: ParamKind,
    /// Whether every call must supply it
    pub required: bool,
    /// Human-readable description
    pub description: &'static str,
}

/// A tool definition for the MCP tools/list response.
#[derive(Debug, Clone)]
pub struct ToolDef {
    /// Tool name (e.g., "create_record")
    pub name: String,
    /// Tool description
    pub description: String,
    /// Parameters in declaration order
    pub params: Vec<ParamSpec>,
}

impl ToolDef {
    /// Create a new tool definition.
    pub fn new(name: &str, description: &str, params: Vec<ParamSpec>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
        }
    }

    /// JSON Schema for the input parameters.
    pub fn input_schema(&self) -> JsonValue {
        let mut props = Map::new();
        for p in &self.params {
            props.insert(
                p.name.to_string(),
                serde_json::json!({ "type": p.kind, "description": p.description }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }

    /// Check `args` against the parameter list.
    ///
    /// Fails on the first missing required parameter, or on any declared
    /// parameter whose value has the wrong kind. `null` counts as absent.
    pub fn validate(&self, args: &Map<String, JsonValue>) -> Result<()> {
        for p in &self.params {
            match args.get(p.name) {
                None | Some(JsonValue::Null) if p.required => {
                    return Err(McpError::MissingArg(p.name.to_string()))
                }
                None | Some(JsonValue::Null) => {}
                Some(value) if !p.kind.matches(value) => {
                    return Err(McpError::InvalidArg {
                        name: p.name.to_string(),
                        reason: format!("expected {}", kind_name(p.kind)),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn kind_name(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::String => "a string",
        ParamKind::Number => "a number",
        ParamKind::Boolean => "a boolean",
        ParamKind::Object => "an object",
    }
}

/// Outcome of a tool call.
///
/// Every call produces exactly one of these; failures never escape as
/// protocol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    /// The call succeeded.
    Text(String),
    /// The call failed; the text says why.
    Error(String),
}

impl ToolResult {
    /// Whether this is the error variant.
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    /// The carried text, whichever variant this is.
    pub fn text(&self) -> &str {
        match self {
            ToolResult::Text(t) | ToolResult::Error(t) => t,
        }
    }

    /// Render as an MCP `tools/call` result.
    pub fn to_call_result(&self) -> JsonValue {
        serde_json::json!({
            "content": [{
                "type": "text",
                "text": self.text()
            }],
            "isError": self.is_error()
        })
    }
}

impl From<Result<String>> for ToolResult {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(text) => ToolResult::Text(text),
            Err(err) => ToolResult::Error(err.to_string()),
        }
    }
}

/// Everything a handler may touch.
#[derive(Clone)]
pub struct ToolContext {
    /// The store facade
    pub backend: Arc<dyn Backend>,
    /// Base URL of the PocketBase instance, used in informational output
    pub backend_url: String,
}

impl ToolContext {
    /// Create a new context.
    pub fn new(backend: Arc<dyn Backend>, backend_url: &str) -> Self {
        Self {
            backend,
            backend_url: backend_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Implementation of a single tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool. `args` has already been validated against the tool's
    /// parameter list.
    async fn call(&self, ctx: &ToolContext, args: &Map<String, JsonValue>) -> Result<String>;
}

struct Entry {
    def: ToolDef,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of all available tools.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every PocketBase tool registered.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        collections::register(&mut registry);
        records::register(&mut registry);
        status::register(&mut registry);
        registry
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one in place.
    pub fn register(&mut self, def: ToolDef, handler: Arc<dyn ToolHandler>) {
        match self.index.get(&def.name) {
            Some(&i) => {
                warn!(tool = %def.name, "Replacing previously registered tool");
                self.entries[i] = Entry { def, handler };
            }
            None => {
                self.index.insert(def.name.clone(), self.entries.len());
                self.entries.push(Entry { def, handler });
            }
        }
    }

    /// Get all tool definitions in registration order.
    pub fn list(&self) -> Vec<&ToolDef> {
        self.entries.iter().map(|e| &e.def).collect()
    }

    /// Look up one tool definition.
    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.index.get(name).map(|&i| &self.entries[i].def)
    }

    /// Dispatch a tool call to the appropriate handler.
    pub async fn dispatch(
        &self,
        ctx: &ToolContext,
        name: &str,
        args: &Map<String, JsonValue>,
    ) -> ToolResult {
        let Some(entry) = self.index.get(name).map(|&i| &self.entries[i]) else {
            warn!(tool = %name, "Call to unknown tool");
            return ToolResult::Error(McpError::UnknownTool(name.to_string()).to_string());
        };

        if let Err(err) = entry.def.validate(args) {
            debug!(tool = %name, error = %err, "Rejected tool arguments");
            return ToolResult::Error(err.to_string());
        }

        debug!(tool = %name, "Dispatching tool call");
        let result = ToolResult::from(entry.handler.call(ctx, args).await);
        if let ToolResult::Error(message) = &result {
            warn!(tool = %name, %message, "Tool call failed");
        }
        result
    }
}

/// Helper macro for declaring a tool's parameter list.
///
/// ```ignore
/// params! {
///     required: { "collection": String => "Collection name" },
///     optional: { "limit": Number => "Maximum number of records" }
/// }
/// ```
#[macro_export]
macro_rules! params {
    (
        required: { $($req_name:literal : $req_kind:ident => $req_desc:literal),* $(,)? },
        optional: { $($opt_name:literal : $opt_kind:ident => $opt_desc:literal),* $(,)? } $(,)?
    ) => {{
        #[allow(unused_mut)]
        let mut params: Vec<$crate::tools::ParamSpec> = Vec::new();
        $(params.push($crate::tools::ParamSpec {
            name: $req_name,
            kind: $crate::tools::ParamKind::$req_kind,
            required: true,
            description: $req_desc,
        });)*
        $(params.push($crate::tools::ParamSpec {
            name: $opt_name,
            kind: $crate::tools::ParamKind::$opt_kind,
            required: false,
            description: $opt_desc,
        });)*
        params
    }};

    (required: { $($req_name:literal : $req_kind:ident => $req_desc:literal),* $(,)? } $(,)?) => {
        $crate::params!(required: { $($req_name : $req_kind => $req_desc),* }, optional: {})
    };

    (optional: { $($opt_name:literal : $opt_kind:ident => $opt_desc:literal),* $(,)? } $(,)?) => {
        $crate::params!(required: {}, optional: { $($opt_name : $opt_kind => $opt_desc),* })
    };

    () => {
        Vec::<$crate::tools::ParamSpec>::new()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, _ctx: &ToolContext, _args: &Map<String, JsonValue>) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(Arc::new(MemoryBackend::new()), "http://localhost:8090/")
    }

    fn args(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_input_schema_lists_required() {
        let def = ToolDef::new(
            "t",
            "test",
            params! {
                required: { "collection": String => "Collection name" },
                optional: { "limit": Number => "Limit" }
            },
        );
        let schema = def.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["collection"]));
        assert_eq!(schema["properties"]["limit"]["type"], "number");
    }

    #[test]
    fn test_validate_missing_and_wrong_kind() {
        let def = ToolDef::new(
            "t",
            "test",
            params! {
                required: { "id": String => "Record id" },
                optional: { "data": Object => "Data" }
            },
        );
        assert!(matches!(
            def.validate(&args(json!({}))),
            Err(McpError::MissingArg(ref n)) if n == "id"
        ));
        assert!(matches!(
            def.validate(&args(json!({"id": "x", "data": [1]}))),
            Err(McpError::InvalidArg { ref name, .. }) if name == "data"
        ));
        assert!(def.validate(&args(json!({"id": "x", "data": null}))).is_ok());
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDef::new("a", "first", params!()), Arc::new(Echo("one")));
        registry.register(ToolDef::new("b", "other", params!()), Arc::new(Echo("b")));
        registry.register(ToolDef::new("a", "second", params!()), Arc::new(Echo("two")));

        let names: Vec<_> = registry.list().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.get("a").map(|d| d.description.as_str()), Some("second"));

        let result = registry.dispatch(&ctx(), "a", &Map::new()).await;
        assert_eq!(result, ToolResult::Text("two".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_envelope() {
        let registry = ToolRegistry::with_default_tools();
        let result = registry.dispatch(&ctx(), "drop_database", &Map::new()).await;
        assert_eq!(
            result,
            ToolResult::Error("unknown tool: drop_database".to_string())
        );
    }

    #[test]
    fn test_call_result_shape() {
        let ok = ToolResult::Text("fine".to_string()).to_call_result();
        assert_eq!(ok["content"][0]["text"], "fine");
        assert_eq!(ok["isError"], false);

        let err = ToolResult::Error("broken".to_string()).to_call_result();
        assert_eq!(err["isError"], true);
    }

    #[test]
    fn test_default_tools_registered() {
        let registry = ToolRegistry::with_default_tools();
        let names: Vec<_> = registry.list().iter().map(|d| d.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "create_collection",
                "list_collections",
                "create_record",
                "query_records",
                "delete_record",
                "server_status",
                "get_pocketbase_info",
            ]
        );
    }
}
