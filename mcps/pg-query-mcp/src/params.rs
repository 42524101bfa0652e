//! Parameter types for pg-query MCP tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SchemaParams {
    #[schemars(description = "Schema to describe (optional, defaults to the configured schema, usually 'public')")]
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ValidateQueryParams {
    #[schemars(description = "SQL query to validate as a read-only SELECT statement")]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteQueryParams {
    #[schemars(description = "PostgreSQL SELECT query to execute. Rejected unless it passes validation.")]
    pub query: String,
}
