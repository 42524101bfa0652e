//! pg-query MCP Library
//!
//! Read-only PostgreSQL access for LLM agents. Every query passes a
//! SELECT-only safety gate before it can reach the database.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use pg_query_mcp::{is_safe_select, PgQueryMcpServer};
//!
//! assert!(is_safe_select("SELECT * FROM users"));
//! assert!(!is_safe_select("SELECT * FROM users; DROP TABLE users;"));
//!
//! let server = PgQueryMcpServer::try_new()?;
//! // Use with in-memory transport or serve via stdio
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod params;
pub mod schema;
pub mod server;
pub mod types;

// Re-export main server type
pub use server::PgQueryMcpServer;

// Re-export the gate entry points
pub use gate::{check_query, is_safe_select, strip_comments, GateMode, QueryGate, Verdict};

// Re-export parameter types for direct API usage
pub use params::*;
