//! Error constructors for MCP tool handlers

use rmcp::ErrorData as McpError;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// Server-side failure (I/O, database, serialization)
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// The request was understood but refused, e.g. by a safety check
pub fn invalid_request(message: impl Into<String>) -> McpError {
    McpError::invalid_request(message.into(), None)
}
