//! Tool handlers
//!
//! Every query goes through the gate before it can reach the database;
//! execute_query does not rely on the caller having validated first.

use mcp_common::{internal_error, invalid_request, json_success, CallToolResult, McpError};

use crate::db::Database;
use crate::error::{QueryError, QueryResult};
use crate::gate::QueryGate;
use crate::params::*;
use crate::schema::DatabaseSchema;
use crate::types::{QueryOutput, SchemaOutput, ValidationOutput};

// ============================================================================
// Helper Functions
// ============================================================================

fn query_error_to_mcp(err: QueryError) -> McpError {
    match &err {
        QueryError::Rejected(_) => invalid_request(err.to_string()),
        QueryError::Connection(_)
        | QueryError::Execution(_)
        | QueryError::Decode { .. }
        | QueryError::Timeout(_)
        | QueryError::Config(_) => internal_error(err.to_string()),
    }
}

/// Gate `query`, then run it unmodified and cap the rows
pub async fn run_query(
    gate: &QueryGate,
    db: &dyn Database,
    query: &str,
    max_rows: usize,
) -> QueryResult<QueryOutput> {
    if let Err(reason) = gate.check(query).into_result() {
        tracing::warn!(%reason, "Refusing to execute query");
        return Err(reason.into());
    }

    // One extra row tells a full result apart from a truncated one
    let rows = db.fetch_rows(query, max_rows.saturating_add(1)).await?;
    let output = QueryOutput::capped(rows, max_rows);

    tracing::info!(
        row_count = output.row_count,
        truncated = output.truncated,
        "Query executed"
    );
    Ok(output)
}

/// Fetch and render `schema`, or an explicit error value
pub async fn describe_schema(db: &dyn Database, schema: &str) -> SchemaOutput {
    match db.fetch_columns(schema).await {
        Ok(records) => {
            let described = DatabaseSchema::from_records(schema, records);
            tracing::info!(schema, tables = described.tables.len(), "Schema described");
            SchemaOutput::Schema {
                schema: described.render(),
            }
        }
        Err(e) => {
            tracing::warn!(schema, "Schema lookup failed: {}", e);
            SchemaOutput::Error {
                error: format!("Encountered an error: {}", e),
            }
        }
    }
}

// ============================================================================
// Handler Functions
// ============================================================================

pub async fn get_database_schema(
    db: &dyn Database,
    default_schema: &str,
    params: SchemaParams,
) -> Result<CallToolResult, McpError> {
    let schema = params
        .schema
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_schema.to_string());

    json_success(&describe_schema(db, &schema).await)
}

pub fn validate_select_query(
    gate: &QueryGate,
    params: ValidateQueryParams,
) -> Result<CallToolResult, McpError> {
    let verdict = gate.check(&params.query);
    if let Some(reason) = verdict.reason() {
        tracing::warn!(%reason, "Query failed validation");
    }

    json_success(&ValidationOutput::from(&verdict))
}

pub async fn execute_query(
    gate: &QueryGate,
    db: &dyn Database,
    max_rows: usize,
    params: ExecuteQueryParams,
) -> Result<CallToolResult, McpError> {
    let output = run_query(gate, db, &params.query, max_rows)
        .await
        .map_err(query_error_to_mcp)?;

    json_success(&output)
}
