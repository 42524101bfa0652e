//! MCP Common - Shared utilities for MCP servers
//!
//! - **Initialization**: `serve_stdio!` macro and [`init_tracing`]
//! - **Results**: [`json_success`] for tool responses
//! - **Errors**: constructors for MCP-compatible errors
//! - **Embeddable**: [`EmbeddableMcp`] trait for in-process execution
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{serve_stdio, json_success};
//!
//! // In main.rs
//! serve_stdio!(MyServer, "my_mcp");
//!
//! // In tool implementations
//! fn my_tool(&self) -> Result<CallToolResult, McpError> {
//!     json_success(&get_some_data())
//! }
//! ```

pub mod embeddable;
pub mod error;
pub mod init;
pub mod result;

// Re-export commonly used items at crate root
pub use embeddable::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use error::{internal_error, invalid_request, McpResult};
pub use init::init_tracing;
pub use result::json_success;

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};

// Re-export async_trait for implementing EmbeddableMcp
pub use async_trait::async_trait;
