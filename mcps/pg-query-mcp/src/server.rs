//! MCP Server implementation for read-only PostgreSQL queries
//!
//! Exposes the schema, validation and execution tools. Handler
//! implementations are in the handlers module.

use std::sync::Arc;

use mcp_common::{
    async_trait, CallToolResult, EmbeddableError, EmbeddableMcp, EmbeddableResult, McpError,
    Tool,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde_json::Value;

use crate::config::{redact_url, Config};
use crate::db::{Database, PgDatabase};
use crate::gate::{GateMode, QueryGate};
use crate::handlers;
use crate::params::*;

const INSTRUCTIONS: &str = "\
Read-only PostgreSQL query MCP server. \
Call get_database_schema first to learn the tables and columns. \
Write PostgreSQL-compatible SELECT queries only; queries must not modify the database. \
Cast numeric, date and other non-text values to TEXT so they are returned verbatim. \
Use validate_select_query to check a query, then execute_query to run it. \
execute_query refuses any query that fails validation.";

/// The pg-query MCP Server
#[derive(Clone)]
pub struct PgQueryMcpServer {
    gate: QueryGate,
    db: Arc<dyn Database>,
    config: Config,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to its handler
// ============================================================================

#[tool_router]
impl PgQueryMcpServer {
    /// Create a server from the standard config locations and `DB_URL`
    ///
    /// Fails if no connection string is configured or it cannot be parsed.
    /// No connection is opened until a tool needs one.
    pub fn try_new() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let url = config.database_url()?;
        let db = PgDatabase::new(url, &config.database)?;

        tracing::info!(
            database = %redact_url(url),
            schema = %config.database.schema,
            gate = ?config.gate.mode,
            "Configured PostgreSQL access"
        );

        Ok(Self::with_database(config, Arc::new(db)))
    }

    /// Create a server over an explicit config and database
    pub fn with_database(config: Config, db: Arc<dyn Database>) -> Self {
        Self {
            gate: QueryGate::new(config.gate.mode),
            db,
            config,
            tool_router: Self::tool_router(),
        }
    }

    pub fn gate_mode(&self) -> GateMode {
        self.gate.mode()
    }

    #[tool(
        description = "Get the database schema: every table in the schema with its columns, data types and nullability. Call this before writing a query."
    )]
    async fn get_database_schema(
        &self,
        Parameters(params): Parameters<SchemaParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_database_schema(self.db.as_ref(), &self.config.database.schema, params).await
    }

    #[tool(
        description = "Check whether a SQL query is a read-only SELECT statement. Returns valid=true, or valid=false with the reason."
    )]
    async fn validate_select_query(
        &self,
        Parameters(params): Parameters<ValidateQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::validate_select_query(&self.gate, params)
    }

    #[tool(
        description = "Execute a read-only SELECT query against the PostgreSQL database and return the rows as a list of column-to-value objects under 'result'."
    )]
    async fn execute_query(
        &self,
        Parameters(params): Parameters<ExecuteQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::execute_query(
            &self.gate,
            self.db.as_ref(),
            self.config.database.max_rows,
            params,
        )
        .await
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for PgQueryMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ============================================================================
// EmbeddableMcp Implementation
// ============================================================================

#[async_trait]
impl EmbeddableMcp for PgQueryMcpServer {
    fn server_name(&self) -> &str {
        "pg-query"
    }

    fn server_description(&self) -> Option<&str> {
        Some(INSTRUCTIONS)
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        match name {
            "get_database_schema" => {
                let params: SchemaParams = serde_json::from_value(params)?;
                self.get_database_schema(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            "validate_select_query" => {
                let params: ValidateQueryParams = serde_json::from_value(params)?;
                self.validate_select_query(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            "execute_query" => {
                let params: ExecuteQueryParams = serde_json::from_value(params)?;
                self.execute_query(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryError, QueryResult};
    use crate::schema::ColumnRecord;
    use crate::types::{Row, Value as RowValue};
    use serde_json::json;
    use std::sync::Mutex;

    /// In-memory database recording every statement it is asked to run
    #[derive(Default)]
    struct FakeDatabase {
        rows: Vec<Row>,
        columns: Vec<ColumnRecord>,
        fail_schema: bool,
        executed: Mutex<Vec<String>>,
        limits: Mutex<Vec<usize>>,
    }

    impl FakeDatabase {
        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }

        fn limits(&self) -> Vec<usize> {
            self.limits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Database for FakeDatabase {
        async fn fetch_rows(&self, sql: &str, limit: usize) -> QueryResult<Vec<Row>> {
            self.executed.lock().unwrap().push(sql.to_string());
            self.limits.lock().unwrap().push(limit);
            Ok(self.rows.iter().take(limit).cloned().collect())
        }

        async fn fetch_columns(&self, _schema: &str) -> QueryResult<Vec<ColumnRecord>> {
            if self.fail_schema {
                return Err(QueryError::Timeout(30));
            }
            Ok(self.columns.clone())
        }
    }

    fn user_row(id: i64, name: &str) -> Row {
        let mut row = Row::new();
        row.push("id", RowValue::from(id));
        row.push("name", RowValue::from(name));
        row
    }

    fn server_with(db: Arc<FakeDatabase>, config: Config) -> PgQueryMcpServer {
        PgQueryMcpServer::with_database(config, db)
    }

    fn result_json(result: &CallToolResult) -> serde_json::Value {
        let text = result.content[0]
            .as_text()
            .expect("text content")
            .text
            .clone();
        serde_json::from_str(&text).expect("json payload")
    }

    #[test]
    fn test_embeddable_server_name() {
        let server = server_with(Arc::new(FakeDatabase::default()), Config::default());
        assert_eq!(server.server_name(), "pg-query");
        assert_eq!(server.gate_mode(), GateMode::Lexical);
    }

    #[test]
    fn test_embeddable_list_tools() {
        let server = server_with(Arc::new(FakeDatabase::default()), Config::default());
        let tools = server.list_tools();
        assert_eq!(tools.len(), 3);

        let tool_names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert!(tool_names.contains(&"get_database_schema"));
        assert!(tool_names.contains(&"validate_select_query"));
        assert!(tool_names.contains(&"execute_query"));
    }

    #[tokio::test]
    async fn test_validate_accepts_select() {
        let server = server_with(Arc::new(FakeDatabase::default()), Config::default());
        let result = server
            .call_tool(
                "validate_select_query",
                json!({ "query": "SELECT * FROM users -- DROP TABLE users" }),
            )
            .await
            .unwrap();

        assert_eq!(result_json(&result), json!({ "valid": true }));
    }

    #[tokio::test]
    async fn test_validate_rejects_with_reason() {
        let server = server_with(Arc::new(FakeDatabase::default()), Config::default());
        let result = server
            .call_tool(
                "validate_select_query",
                json!({ "query": "SELECT * FROM users; DROP TABLE users;" }),
            )
            .await
            .unwrap();

        assert_eq!(
            result_json(&result),
            json!({ "valid": false, "reason": "query contains forbidden keyword DROP" })
        );
    }

    #[tokio::test]
    async fn test_execute_returns_rows() {
        let db = Arc::new(FakeDatabase {
            rows: vec![user_row(1, "ada"), user_row(2, "grace")],
            ..FakeDatabase::default()
        });
        let server = server_with(db.clone(), Config::default());

        let query = "SELECT id, name FROM users /* all of them */";
        let result = server
            .call_tool("execute_query", json!({ "query": query }))
            .await
            .unwrap();

        assert_eq!(
            result_json(&result),
            json!({
                "result": [
                    { "id": 1, "name": "ada" },
                    { "id": 2, "name": "grace" }
                ],
                "row_count": 2,
                "truncated": false
            })
        );
        // The unmodified text is executed, comments included
        assert_eq!(db.executed(), vec![query.to_string()]);
    }

    #[tokio::test]
    async fn test_execute_rejected_never_reaches_database() {
        let db = Arc::new(FakeDatabase::default());
        let server = server_with(db.clone(), Config::default());

        let result = server
            .call_tool("execute_query", json!({ "query": "DELETE FROM users" }))
            .await;

        match result {
            Err(EmbeddableError::McpError(message)) => {
                assert!(message.contains("must start with SELECT"), "{}", message)
            }
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_execute_caps_rows() {
        let db = Arc::new(FakeDatabase {
            rows: (0..5).map(|i| user_row(i, "x")).collect(),
            ..FakeDatabase::default()
        });
        let mut config = Config::default();
        config.database.max_rows = 3;
        let server = server_with(db.clone(), config);

        let result = server
            .call_tool("execute_query", json!({ "query": "SELECT id, name FROM users" }))
            .await
            .unwrap();

        let payload = result_json(&result);
        assert_eq!(payload["row_count"], json!(3));
        assert_eq!(payload["truncated"], json!(true));
        // Only one row past the cap is ever read
        assert_eq!(db.limits(), vec![4]);
    }

    #[tokio::test]
    async fn test_execute_exactly_max_rows_not_truncated() {
        let db = Arc::new(FakeDatabase {
            rows: (0..3).map(|i| user_row(i, "x")).collect(),
            ..FakeDatabase::default()
        });
        let mut config = Config::default();
        config.database.max_rows = 3;
        let server = server_with(db, config);

        let result = server
            .call_tool("execute_query", json!({ "query": "SELECT id, name FROM users" }))
            .await
            .unwrap();

        let payload = result_json(&result);
        assert_eq!(payload["row_count"], json!(3));
        assert_eq!(payload["truncated"], json!(false));
    }

    #[tokio::test]
    async fn test_parsed_mode_accepts_with_query() {
        let db = Arc::new(FakeDatabase::default());
        let mut config = Config::default();
        config.gate.mode = GateMode::Parsed;
        let server = server_with(db.clone(), config);

        let query = "WITH recent AS (SELECT id FROM logs) SELECT * FROM recent";
        server
            .call_tool("execute_query", json!({ "query": query }))
            .await
            .unwrap();
        assert_eq!(db.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_schema_rendered() {
        let db = Arc::new(FakeDatabase {
            columns: vec![ColumnRecord {
                table_name: "users".to_string(),
                column_name: "id".to_string(),
                data_type: "integer".to_string(),
                is_nullable: "NO".to_string(),
            }],
            ..FakeDatabase::default()
        });
        let server = server_with(db, Config::default());

        let result = server
            .call_tool("get_database_schema", json!({}))
            .await
            .unwrap();

        assert_eq!(
            result_json(&result),
            json!({ "schema": "Database Schema:\n\nTable: users\n  - id (integer, NOT NULL)\n" })
        );
    }

    #[tokio::test]
    async fn test_schema_failure_is_error_value() {
        let db = Arc::new(FakeDatabase {
            fail_schema: true,
            ..FakeDatabase::default()
        });
        let server = server_with(db, Config::default());

        let result = server
            .call_tool("get_database_schema", json!({ "schema": "reporting" }))
            .await
            .unwrap();

        assert_eq!(
            result_json(&result),
            json!({ "error": "Encountered an error: Query timed out after 30s" })
        );
    }

    #[tokio::test]
    async fn test_embeddable_unknown_tool() {
        let server = server_with(Arc::new(FakeDatabase::default()), Config::default());
        let result = server.call_tool("drop_everything", json!({})).await;
        assert!(matches!(result, Err(EmbeddableError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn test_embeddable_invalid_params() {
        let server = server_with(Arc::new(FakeDatabase::default()), Config::default());
        let result = server.call_tool("execute_query", json!({ "sql": "SELECT 1" })).await;
        assert!(matches!(result, Err(EmbeddableError::SerdeError(_))));
    }
}
