//! pg-query MCP - read-only PostgreSQL queries behind a SELECT-only gate
//!
//! Reads `DB_URL` (and optionally `DB_SCHEMA`) from the environment or a
//! `.env` file, then serves schema, validation and execution tools on stdio.

use pg_query_mcp::PgQueryMcpServer;

mcp_common::serve_stdio!(PgQueryMcpServer, "pg_query_mcp");
