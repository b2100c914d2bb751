//! Error types for the MCP server.
//!
//! Backend failures are mapped to MCP-friendly errors. Tool handlers never let
//! these escape as protocol faults: the registry renders them into an error
//! envelope, so only JSON-RPC framing problems use the `rpc_codes` below.

/// Errors reported by the backend store facade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The requested collection or record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The filter expression could not be understood by the store.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The store rejected the data it was given.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The store answered with an unexpected status.
    #[error("backend returned {status}: {message}")]
    Response {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },
}

/// MCP server errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum McpError {
    /// Unknown tool requested.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArg(String),

    /// Invalid argument value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArg {
        /// Argument name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Collection lookup failed.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Record lookup failed.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// A backend call failed.
    #[error("{operation} failed: {message}")]
    Backend {
        /// The operation that was attempted
        operation: String,
        /// Underlying backend message
        message: String,
    },
}

impl McpError {
    /// Wrap a backend failure with the name of the operation that produced it.
    pub fn backend(operation: &str, err: BackendError) -> Self {
        McpError::Backend {
            operation: operation.to_string(),
            message: err.to_string(),
        }
    }

    /// Convert to JSON-RPC error code.
    pub fn rpc_code(&self) -> i32 {
        match self {
            McpError::UnknownTool(_) => rpc_codes::METHOD_NOT_FOUND,
            McpError::MissingArg(_)
            | McpError::InvalidArg { .. }
            | McpError::CollectionNotFound(_)
            | McpError::RecordNotFound(_) => rpc_codes::INVALID_PARAMS,
            McpError::Backend { .. } => rpc_codes::INTERNAL_ERROR,
        }
    }
}

/// JSON-RPC error codes.
pub mod rpc_codes {
    /// Parse error - Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type for backend facade calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
