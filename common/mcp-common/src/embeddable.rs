//! Embeddable MCP trait for in-process execution
//!
//! Lets a host call a server's tools directly, without spawning a process
//! or speaking the protocol over stdio. Server tests use it the same way.
//!
//! ```rust,ignore
//! use mcp_common::EmbeddableMcp;
//!
//! let tools = server.list_tools();
//! let result = server
//!     .call_tool("validate_select_query", serde_json::json!({ "query": "SELECT 1" }))
//!     .await?;
//! ```

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;

/// Error type for embeddable MCP operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Parameters did not deserialize into the tool's parameter type
    #[error("invalid parameters: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// The tool itself returned an MCP error
    #[error("mcp error: {0}")]
    McpError(String),
}

impl From<rmcp::ErrorData> for EmbeddableError {
    fn from(err: rmcp::ErrorData) -> Self {
        EmbeddableError::McpError(err.message.to_string())
    }
}

pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

/// An MCP server whose tools can be called in-process
///
/// Implementations delegate to their `#[tool_router]` methods and must be
/// `Send + Sync` so tools can be called from concurrent tasks.
#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    /// Name used in MCP configuration files
    fn server_name(&self) -> &str;

    fn list_tools(&self) -> Vec<Tool>;

    /// Run tool `name` with a JSON object of parameters
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult>;

    fn server_description(&self) -> Option<&str> {
        None
    }
}
